// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! Services module - business logic layer.

pub mod admin;
pub mod csv_codec;
pub mod ledger;
pub mod notifier;

pub use admin::{AdminAccountStore, AuthAdmin, LoginOutcome, QuestionInput, SecurityPrompt};
pub use ledger::{
    CustomerPage, CustomerQuery, DashboardStats, ImportReport, LedgerSettings, Lookup,
    LoyaltyLedger, RowError, StampOutcome, StatusFilter,
};
pub use notifier::{Channel, Delivery, Destination, LogNotifier, Notifier, NotifyError, WebhookNotifier};
