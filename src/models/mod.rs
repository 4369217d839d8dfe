// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! Data models for the application.

pub mod admin;
pub mod customer;

pub use admin::{AdminAccount, AdminSession, DeviceInfo, SecurityQuestion};
pub use customer::{
    CardStatus, Customer, NotificationPreferences, StampEntry, STAMPS_TO_COMPLETE,
};
