// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! Middleware modules (authentication, security headers).

pub mod auth;
pub mod security;

pub use auth::{require_auth, AuthAdmin, SESSION_COOKIE};
