// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! In-process store backed by `dashmap`, optionally mirrored to a JSON
//! snapshot file.
//!
//! Reads go straight to the sharded maps. Writes are serialised by one
//! mutation lock: each builds the new record, writes the snapshot with that
//! record swapped in, and only then commits to memory. A failed snapshot
//! write therefore leaves memory and disk agreeing on the old state.
//! Session activity is the one write that stays in memory.

use crate::db::{Apply, Store};
use crate::error::{AppError, DuplicateField, Result};
use crate::models::{AdminAccount, AdminSession, Customer};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// On-disk snapshot layout.
#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    customers: Vec<Customer>,
    #[serde(default)]
    accounts: Vec<AdminAccount>,
    #[serde(default)]
    sessions: Vec<AdminSession>,
}

/// Replace the element `same` picks out, or append `value`.
fn upsert<T>(items: &mut Vec<T>, same: impl Fn(&T) -> bool, value: T) {
    match items.iter_mut().find(|item| same(item)) {
        Some(slot) => *slot = value,
        None => items.push(value),
    }
}

/// Dashmap-backed [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    customers: DashMap<String, Customer>,
    /// mobile -> customer id
    mobiles: DashMap<String, String>,
    accounts: Mutex<BTreeMap<String, AdminAccount>>,
    sessions: DashMap<String, AdminSession>,
    snapshot_path: Option<PathBuf>,
    /// Held for the whole of every persisted write.
    mutation_lock: Mutex<()>,
}

impl MemoryStore {
    /// Create an empty, memory-only store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store mirrored to `path`, loading the snapshot if it exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut store = Self {
            snapshot_path: Some(path.clone()),
            ..Self::default()
        };

        if !path.exists() {
            tracing::info!(path = %path.display(), "No snapshot found, starting empty");
            return Ok(store);
        }

        let bytes = fs::read(&path).map_err(|e| {
            AppError::Storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::Storage(format!("Corrupt snapshot {}: {}", path.display(), e))
        })?;

        let (customers, accounts, sessions) = (
            snapshot.customers.len(),
            snapshot.accounts.len(),
            snapshot.sessions.len(),
        );

        for customer in snapshot.customers {
            store.commit_customer(customer)?;
        }
        store.accounts = Mutex::new(
            snapshot
                .accounts
                .into_iter()
                .map(|a| (a.username.clone(), a))
                .collect(),
        );
        for session in snapshot.sessions {
            store.sessions.insert(session.id.clone(), session);
        }

        tracing::info!(
            path = %path.display(),
            customers,
            accounts,
            sessions,
            "Loaded store snapshot"
        );
        Ok(store)
    }

    fn accounts(&self) -> Result<MutexGuard<'_, BTreeMap<String, AdminAccount>>> {
        self.accounts
            .lock()
            .map_err(|_| AppError::Storage("Account table lock poisoned".to_string()))
    }

    fn lock_mutations(&self) -> Result<MutexGuard<'_, ()>> {
        self.mutation_lock
            .lock()
            .map_err(|_| AppError::Storage("Store mutation lock poisoned".to_string()))
    }

    /// Fail with `DuplicateCustomer` if the id or mobile is taken.
    fn check_customer_slot(&self, customer: &Customer) -> Result<()> {
        if let Some(holder) = self.mobiles.get(&customer.mobile) {
            return Err(AppError::DuplicateCustomer {
                id: holder.value().clone(),
                field: DuplicateField::Mobile,
            });
        }
        if self.customers.contains_key(&customer.id) {
            return Err(AppError::DuplicateCustomer {
                id: customer.id.clone(),
                field: DuplicateField::Id,
            });
        }
        Ok(())
    }

    /// Claim the mobile, then the id. Nothing takes them in the opposite
    /// order.
    fn commit_customer(&self, customer: Customer) -> Result<()> {
        match self.mobiles.entry(customer.mobile.clone()) {
            Entry::Occupied(existing) => Err(AppError::DuplicateCustomer {
                id: existing.get().clone(),
                field: DuplicateField::Mobile,
            }),
            Entry::Vacant(mobile_slot) => match self.customers.entry(customer.id.clone()) {
                Entry::Occupied(existing) => Err(AppError::DuplicateCustomer {
                    id: existing.key().clone(),
                    field: DuplicateField::Id,
                }),
                Entry::Vacant(id_slot) => {
                    mobile_slot.insert(customer.id.clone());
                    id_slot.insert(customer);
                    Ok(())
                }
            },
        }
    }

    /// Write the current state with `pending` applied to the snapshot file
    /// (temp file + rename). No-op without a path.
    ///
    /// Callers hold the mutation lock and no map references.
    fn persist(&self, pending: impl FnOnce(&mut Snapshot)) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let mut snapshot = Snapshot {
            customers: self.customers.iter().map(|r| r.value().clone()).collect(),
            accounts: self.accounts()?.values().cloned().collect(),
            sessions: self.sessions.iter().map(|r| r.value().clone()).collect(),
        };
        pending(&mut snapshot);

        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| AppError::Storage(format!("Failed to encode snapshot: {}", e)))?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            AppError::Storage(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        Ok(())
    }
}

impl Store for MemoryStore {
    // ─── Customers ───────────────────────────────────────────────

    fn insert_customer(&self, customer: Customer) -> Result<()> {
        let _guard = self.lock_mutations()?;
        self.check_customer_slot(&customer)?;
        self.persist(|s| s.customers.push(customer.clone()))?;
        self.commit_customer(customer)
    }

    fn get_customer(&self, id: &str) -> Result<Option<Customer>> {
        Ok(self.customers.get(id).map(|r| r.value().clone()))
    }

    fn find_customer_by_mobile(&self, mobile: &str) -> Result<Option<Customer>> {
        let Some(id) = self.mobiles.get(mobile).map(|r| r.value().clone()) else {
            return Ok(None);
        };
        self.get_customer(&id)
    }

    fn update_customer(&self, id: &str, apply: Apply<'_, Customer>) -> Result<Customer> {
        let _guard = self.lock_mutations()?;
        let current = self
            .get_customer(id)?
            .ok_or_else(|| AppError::NotFound(format!("Customer {}", id)))?;

        let mut working = current.clone();
        apply(&mut working)?;
        if working.id != current.id || working.mobile != current.mobile {
            return Err(AppError::Validation(
                "Customer ID and mobile cannot be changed".to_string(),
            ));
        }

        self.persist(|s| upsert(&mut s.customers, |c| c.id == working.id, working.clone()))?;
        self.customers.insert(working.id.clone(), working.clone());
        Ok(working)
    }

    fn delete_customer(&self, id: &str) -> Result<Option<Customer>> {
        let _guard = self.lock_mutations()?;
        let Some(existing) = self.get_customer(id)? else {
            return Ok(None);
        };

        self.persist(|s| s.customers.retain(|c| c.id != existing.id))?;
        self.customers.remove(&existing.id);
        self.mobiles.remove(&existing.mobile);
        Ok(Some(existing))
    }

    fn list_customers(&self) -> Result<Vec<Customer>> {
        Ok(self.customers.iter().map(|r| r.value().clone()).collect())
    }

    // ─── Admin accounts ──────────────────────────────────────────

    fn insert_account(&self, account: AdminAccount, only_if_empty: bool) -> Result<()> {
        let _guard = self.lock_mutations()?;
        {
            let accounts = self.accounts()?;
            if only_if_empty && !accounts.is_empty() {
                return Err(AppError::AlreadySetup);
            }
            if accounts.contains_key(&account.username) {
                return Err(AppError::DuplicateAccount);
            }
        }

        self.persist(|s| s.accounts.push(account.clone()))?;
        self.accounts()?.insert(account.username.clone(), account);
        Ok(())
    }

    fn get_account(&self, username: &str) -> Result<Option<AdminAccount>> {
        Ok(self.accounts()?.get(username).cloned())
    }

    fn has_accounts(&self) -> Result<bool> {
        Ok(!self.accounts()?.is_empty())
    }

    fn update_account(
        &self,
        username: &str,
        apply: Apply<'_, AdminAccount>,
    ) -> Result<AdminAccount> {
        let _guard = self.lock_mutations()?;
        let current = self
            .get_account(username)?
            .ok_or_else(|| AppError::NotFound(format!("Account {}", username)))?;

        let mut working = current.clone();
        apply(&mut working)?;
        working.username = current.username;

        self.persist(|s| {
            upsert(
                &mut s.accounts,
                |a| a.username == working.username,
                working.clone(),
            )
        })?;
        self.accounts()?
            .insert(working.username.clone(), working.clone());
        Ok(working)
    }

    // ─── Sessions ────────────────────────────────────────────────

    fn insert_session(&self, session: AdminSession) -> Result<()> {
        let _guard = self.lock_mutations()?;
        if self.sessions.contains_key(&session.id) {
            return Err(AppError::Storage("Session id collision".to_string()));
        }

        self.persist(|s| s.sessions.push(session.clone()))?;
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    fn get_session(&self, id: &str) -> Result<Option<AdminSession>> {
        Ok(self.sessions.get(id).map(|r| r.value().clone()))
    }

    fn update_session(&self, id: &str, apply: Apply<'_, AdminSession>) -> Result<AdminSession> {
        let _guard = self.lock_mutations()?;
        let current = self
            .get_session(id)?
            .ok_or_else(|| AppError::NotFound(format!("Session {}", id)))?;

        let mut working = current.clone();
        apply(&mut working)?;
        working.id = current.id;
        working.username = current.username;

        self.persist(|s| upsert(&mut s.sessions, |x| x.id == working.id, working.clone()))?;
        self.sessions.insert(working.id.clone(), working.clone());
        Ok(working)
    }

    fn touch_session(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Session {}", id)))?;
        session.last_activity = at;
        Ok(())
    }

    fn deactivate_sessions(&self, username: &str) -> Result<usize> {
        let _guard = self.lock_mutations()?;
        let ids: Vec<String> = self
            .sessions
            .iter()
            .filter(|s| s.username == username && s.is_active)
            .map(|s| s.id.clone())
            .collect();

        self.persist(|s| {
            for session in s.sessions.iter_mut().filter(|x| ids.contains(&x.id)) {
                session.is_active = false;
            }
        })?;
        for id in &ids {
            if let Some(mut session) = self.sessions.get_mut(id) {
                session.is_active = false;
            }
        }
        Ok(ids.len())
    }
}
