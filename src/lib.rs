// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! RK Dragon Loyalty: stamp-card tracking for RK Dragon Panipuri
//!
//! This crate provides the backend API: customer registration, stamp
//! accumulation with completion notifications, CSV import/export and the
//! administrator login that protects all of it.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use services::{AdminAccountStore, LedgerSettings, LoyaltyLedger, Notifier};
use std::sync::Arc;
use time_utils::Clock;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub ledger: LoyaltyLedger,
    pub admin: AdminAccountStore,
}

impl AppState {
    /// Wire the services around one store, notifier and clock.
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ledger = LoyaltyLedger::new(
            store.clone(),
            notifier,
            clock.clone(),
            LedgerSettings {
                completion_channels: config.notify_channels.clone(),
                country_code: config.country_code.clone(),
                notify_timeout: config.notify_timeout,
            },
        );
        let admin = AdminAccountStore::new(store, clock, config.jwt_signing_key.clone());

        Self {
            config,
            ledger,
            admin,
        }
    }
}
