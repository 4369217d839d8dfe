// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! Storage layer.
//!
//! Services talk to an injected [`Store`]; uniqueness and per-record
//! atomicity are the store's job, not the caller's. A write that returns an
//! error has changed nothing.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{AdminAccount, AdminSession, Customer};
use chrono::{DateTime, Utc};

/// Mutation applied to a record under the store's per-record lock.
///
/// The closure sees a working copy; if it returns an error the stored
/// record is left untouched.
pub type Apply<'a, T> = &'a mut dyn FnMut(&mut T) -> Result<()>;

/// Durable key-unique record storage.
pub trait Store: Send + Sync {
    // ─── Customers ───────────────────────────────────────────────

    /// Insert a customer if neither its id nor its mobile is taken.
    ///
    /// Fails with `AppError::DuplicateCustomer` naming the field that
    /// collided and the id of the customer holding it.
    fn insert_customer(&self, customer: Customer) -> Result<()>;

    /// Get a customer by (upper-cased) id.
    fn get_customer(&self, id: &str) -> Result<Option<Customer>>;

    /// Get a customer by mobile number.
    fn find_customer_by_mobile(&self, mobile: &str) -> Result<Option<Customer>>;

    /// Atomically read-modify-write one customer. `mobile` and `id` must
    /// not be changed by `apply`.
    ///
    /// Returns the updated record, or `AppError::NotFound`.
    fn update_customer(&self, id: &str, apply: Apply<'_, Customer>) -> Result<Customer>;

    /// Remove a customer and release its mobile number.
    fn delete_customer(&self, id: &str) -> Result<Option<Customer>>;

    /// Snapshot of all customers, in no particular order.
    fn list_customers(&self) -> Result<Vec<Customer>>;

    // ─── Admin accounts ──────────────────────────────────────────

    /// Insert an account. With `only_if_empty`, fails with
    /// `AppError::AlreadySetup` when any account exists; otherwise fails
    /// with `AppError::DuplicateAccount` on a username clash.
    fn insert_account(&self, account: AdminAccount, only_if_empty: bool) -> Result<()>;

    fn get_account(&self, username: &str) -> Result<Option<AdminAccount>>;

    fn has_accounts(&self) -> Result<bool>;

    /// Atomically read-modify-write one account.
    fn update_account(&self, username: &str, apply: Apply<'_, AdminAccount>)
        -> Result<AdminAccount>;

    // ─── Sessions ────────────────────────────────────────────────

    fn insert_session(&self, session: AdminSession) -> Result<()>;

    fn get_session(&self, id: &str) -> Result<Option<AdminSession>>;

    /// Atomically read-modify-write one session.
    fn update_session(&self, id: &str, apply: Apply<'_, AdminSession>) -> Result<AdminSession>;

    /// Record activity on a session. Only kept in memory; the snapshot is
    /// not rewritten.
    fn touch_session(&self, id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Mark every session belonging to `username` inactive. Returns how
    /// many were active before the call.
    fn deactivate_sessions(&self, username: &str) -> Result<usize>;
}
