// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! Loyalty ledger: customer registration and the stamp lifecycle.
//!
//! Handles:
//! 1. Registration with generated `RK-NNNNNN` ids and unique mobiles
//! 2. Stamping, with the one-way transition to Completed at six stamps
//! 3. Completion notifications (logged, never fatal)
//! 4. Lookup, listing and dashboard statistics
//! 5. CSV bulk import (per-row failures) and export

use crate::db::Store;
use crate::error::{AppError, DuplicateField, Result};
use crate::models::{CardStatus, Customer, StampEntry, STAMPS_TO_COMPLETE};
use crate::services::csv_codec::ImportRow;
use crate::services::notifier::{
    completion_message, welcome_message, Channel, Delivery, Destination, Notifier, NotifyError,
};
use crate::time_utils::{parse_flexible_date, start_of_day, start_of_month, Clock};
use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Attempts at finding an unused generated id before giving up.
const MAX_ID_ATTEMPTS: usize = 32;
/// `added_by` for stamps carried in by an import.
const IMPORT_ACTOR: &str = "import";
const MAX_NAME_LEN: usize = 100;
const DEFAULT_PAGE_SIZE: usize = 10;
const MAX_PAGE_SIZE: usize = 100;

/// How to find a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Id(String),
    Mobile(String),
}

/// Result of a stamp.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StampOutcome {
    pub customer: Customer,
    pub completed: bool,
}

/// Listing filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

/// Listing query.
#[derive(Debug, Clone, Default)]
pub struct CustomerQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
    pub status: StatusFilter,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_records: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerPage {
    pub customers: Vec<Customer>,
    pub pagination: Pagination,
}

/// Dashboard counters. "Today" and "this month" are UTC.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_customers: usize,
    pub active_cards: usize,
    pub completed_cards: usize,
    pub new_today_customers: usize,
    pub completed_today_cards: usize,
    /// Rounded percentage of customers with a completed card
    pub completion_rate: u32,
    pub monthly_registrations: Vec<DailyCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub day: u32,
    pub count: usize,
}

/// A rejected import row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "Row {} (ID {}): {}", self.row, id, self.message),
            None => write!(f, "Row {}: {}", self.row, self.message),
        }
    }
}

/// Aggregate result of a bulk import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub merged: usize,
    pub rejected: usize,
    pub errors: Vec<RowError>,
}

impl ImportReport {
    fn reject(&mut self, row: usize, id: Option<String>, message: impl Into<String>) {
        self.rejected += 1;
        self.errors.push(RowError {
            row,
            id,
            message: message.into(),
        });
    }
}

/// A validated import row.
struct ValidRow {
    id: Option<String>,
    name: String,
    mobile: String,
    registration_date: Option<DateTime<Utc>>,
    stamps: u8,
    completion_date: Option<DateTime<Utc>>,
}

/// Ledger settings taken from configuration.
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub completion_channels: Vec<Channel>,
    pub country_code: String,
    pub notify_timeout: Duration,
}

/// Owns customer records and the stamp lifecycle.
pub struct LoyaltyLedger {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: LedgerSettings,
}

impl LoyaltyLedger {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            settings,
        }
    }

    // ─── Registration ────────────────────────────────────────────

    /// Register a new customer.
    ///
    /// A mobile that is already registered fails with
    /// `AppError::DuplicateCustomer` carrying the existing customer's id.
    pub fn register(&self, name: &str, mobile: &str) -> Result<Customer> {
        let name = validate_name(name)?;
        let mobile = validate_mobile(mobile)?;
        let now = self.clock.now();

        for _ in 0..MAX_ID_ATTEMPTS {
            let customer = Customer::new(generate_customer_id(), name.clone(), mobile.clone(), now);

            match self.store.insert_customer(customer.clone()) {
                Ok(()) => {
                    tracing::info!(customer_id = %customer.id, "Customer registered");
                    return Ok(customer);
                }
                Err(AppError::DuplicateCustomer {
                    field: DuplicateField::Id,
                    ..
                }) => {
                    tracing::debug!(customer_id = %customer.id, "Generated id collided, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Internal(anyhow::anyhow!(
            "No free customer id after {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }

    // ─── Stamps ──────────────────────────────────────────────────

    /// Add one stamp on behalf of `actor`.
    ///
    /// The increment is a single atomic update in the store, so two
    /// concurrent calls on a card with five stamps produce exactly one
    /// completion. Notification failures are logged and do not undo the
    /// stamp.
    pub async fn add_stamp(&self, customer_id: &str, actor: &str) -> Result<StampOutcome> {
        let id = normalize_id(customer_id);
        let now = self.clock.now();
        let store = Arc::clone(&self.store);
        let stamped_by = actor.to_string();

        let (customer, completed) = tokio::task::spawn_blocking(move || {
            let mut completed = false;
            let customer = store.update_customer(&id, &mut |c| {
                if c.is_complete() {
                    return Err(AppError::AlreadyComplete { id: c.id.clone() });
                }
                completed = c.push_stamp(&stamped_by, now);
                Ok(())
            })?;
            Ok::<_, AppError>((customer, completed))
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Stamp task failed: {}", e)))??;

        tracing::info!(
            customer_id = %customer.id,
            stamps = customer.stamps_received,
            actor,
            "Stamp added"
        );

        if completed {
            tracing::info!(customer_id = %customer.id, "Loyalty card completed");
            self.notify_completion(&customer).await;
        }

        Ok(StampOutcome {
            customer,
            completed,
        })
    }

    /// Send the completion message over every configured channel the
    /// customer accepts.
    async fn notify_completion(&self, customer: &Customer) {
        let message = completion_message(&customer.name);
        let prefs = customer.notification_preferences;

        for &channel in &self.settings.completion_channels {
            let allowed = match channel {
                Channel::WhatsApp => prefs.whatsapp,
                Channel::Sms => prefs.sms,
                // No email address is collected at registration.
                Channel::Email => false,
            };
            if !allowed {
                continue;
            }

            let destination = Destination {
                channel,
                address: self.phone_address(&customer.mobile),
            };
            match self.send_bounded(&destination, &message).await {
                Ok(delivery) => tracing::info!(
                    customer_id = %customer.id,
                    %channel,
                    simulated = delivery.simulated,
                    "Completion notification sent"
                ),
                Err(e) => tracing::warn!(
                    customer_id = %customer.id,
                    %channel,
                    error = %e,
                    "Completion notification failed"
                ),
            }
        }
    }

    async fn send_bounded(
        &self,
        destination: &Destination,
        message: &str,
    ) -> std::result::Result<Delivery, NotifyError> {
        let timeout = self.settings.notify_timeout;
        tokio::time::timeout(timeout, self.notifier.send(destination, message))
            .await
            .map_err(|_| NotifyError::Timeout(timeout))?
    }

    fn phone_address(&self, mobile: &str) -> String {
        format!("{}{}", self.settings.country_code, mobile)
    }

    /// Send the welcome/card details to the customer, or to `contact` when
    /// given. Email requires an explicit contact.
    pub async fn share(
        &self,
        customer_id: &str,
        channel: Channel,
        contact: Option<&str>,
    ) -> Result<Delivery> {
        let customer = self.lookup(Lookup::Id(customer_id.to_string()))?;
        let contact = contact.map(str::trim).filter(|c| !c.is_empty());

        let address = match (channel, contact) {
            (Channel::Email, Some(email)) if email.contains('@') => email.to_string(),
            (Channel::Email, _) => {
                return Err(AppError::Validation(
                    "A valid email address is required for email sharing".to_string(),
                ));
            }
            (_, Some(number)) => self.phone_address(&validate_mobile(number)?),
            (_, None) => self.phone_address(&customer.mobile),
        };

        let destination = Destination { channel, address };
        let message = welcome_message(&customer.id, customer.stamps_received);

        let delivery = self.send_bounded(&destination, &message).await.map_err(|e| {
            tracing::warn!(customer_id = %customer.id, %channel, error = %e, "Share failed");
            AppError::Internal(anyhow::anyhow!("Sharing via {} failed: {}", channel, e))
        })?;

        tracing::info!(customer_id = %customer.id, %channel, "Customer details shared");
        Ok(delivery)
    }

    // ─── Lookup & listing ────────────────────────────────────────

    /// Find a customer by id (case-insensitive) or mobile.
    pub fn lookup(&self, by: Lookup) -> Result<Customer> {
        let found = match &by {
            Lookup::Id(id) => self.store.get_customer(&normalize_id(id))?,
            Lookup::Mobile(mobile) => self.store.find_customer_by_mobile(mobile.trim())?,
        };
        found.ok_or_else(|| AppError::NotFound("Customer".to_string()))
    }

    /// Explicit admin delete.
    pub fn delete(&self, customer_id: &str) -> Result<Customer> {
        let removed = self
            .store
            .delete_customer(&normalize_id(customer_id))?
            .ok_or_else(|| AppError::NotFound("Customer".to_string()))?;
        tracing::info!(customer_id = %removed.id, "Customer deleted");
        Ok(removed)
    }

    /// Paginated, filtered listing, newest first.
    pub fn list(&self, query: &CustomerQuery) -> Result<CustomerPage> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let page = query.page.unwrap_or(1).max(1);
        let needle = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let matching: Vec<Customer> = self
            .export_all()?
            .into_iter()
            .filter(|c| match query.status {
                StatusFilter::All => true,
                StatusFilter::Active => !c.is_complete(),
                StatusFilter::Completed => c.is_complete(),
            })
            .filter(|c| {
                needle.as_deref().is_none_or(|n| {
                    c.name.to_lowercase().contains(n)
                        || c.mobile.contains(n)
                        || c.id.to_lowercase().contains(n)
                })
            })
            .collect();

        let total_records = matching.len();
        let total_pages = total_records.div_ceil(limit);
        let customers = matching
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();

        Ok(CustomerPage {
            customers,
            pagination: Pagination {
                current_page: page,
                total_pages,
                total_records,
                has_next: page < total_pages,
                has_prev: page > 1,
            },
        })
    }

    /// Dashboard counters as of now.
    pub fn stats(&self) -> Result<DashboardStats> {
        let now = self.clock.now();
        let today = start_of_day(now);
        let month = start_of_month(now);
        let customers = self.store.list_customers()?;

        let total = customers.len();
        let completed = customers.iter().filter(|c| c.is_complete()).count();
        let mut by_day: BTreeMap<u32, usize> = BTreeMap::new();
        for c in customers.iter().filter(|c| c.registration_date >= month) {
            *by_day.entry(c.registration_date.day()).or_default() += 1;
        }

        let completion_rate = if total > 0 {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        } else {
            0
        };

        Ok(DashboardStats {
            total_customers: total,
            active_cards: total - completed,
            completed_cards: completed,
            new_today_customers: customers
                .iter()
                .filter(|c| c.registration_date >= today)
                .count(),
            completed_today_cards: customers
                .iter()
                .filter(|c| c.completion_date.is_some_and(|d| d >= today))
                .count(),
            completion_rate,
            monthly_registrations: by_day
                .into_iter()
                .map(|(day, count)| DailyCount { day, count })
                .collect(),
        })
    }

    // ─── Import / export ─────────────────────────────────────────

    /// All customers, most recently created first.
    pub fn export_all(&self) -> Result<Vec<Customer>> {
        let mut customers = self.store.list_customers()?;
        customers.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(customers)
    }

    /// Import rows, creating new customers and merging into existing ones.
    ///
    /// A bad row is recorded in the report and never stops the batch.
    pub fn bulk_import(&self, rows: Vec<ImportRow>) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        for row in rows {
            let row_number = row.row;
            let row_id = row.id.as_deref().map(normalize_id);

            let valid = match validate_row(row) {
                Ok(valid) => valid,
                Err(message) => {
                    report.reject(row_number, row_id, message);
                    continue;
                }
            };

            match self.import_one(valid) {
                Ok(ImportAction::Created) => report.created += 1,
                Ok(ImportAction::Merged) => report.merged += 1,
                Err(e) => report.reject(row_number, row_id, import_error_message(&e)),
            }
        }

        tracing::info!(
            created = report.created,
            merged = report.merged,
            rejected = report.rejected,
            "CSV import completed"
        );
        Ok(report)
    }

    fn import_one(&self, row: ValidRow) -> Result<ImportAction> {
        let by_id = match &row.id {
            Some(id) => self.store.get_customer(id)?,
            None => None,
        };
        let by_mobile = self.store.find_customer_by_mobile(&row.mobile)?;

        let target = match (by_id, by_mobile) {
            (Some(a), Some(b)) if a.id != b.id => {
                return Err(AppError::Validation(format!(
                    "ID belongs to {} but mobile belongs to {}",
                    a.id, b.id
                )));
            }
            (Some(existing), _) if existing.mobile != row.mobile => {
                return Err(AppError::Validation(format!(
                    "Mobile of {} cannot be changed",
                    existing.id
                )));
            }
            (Some(existing), _) | (None, Some(existing)) => Some(existing),
            (None, None) => None,
        };

        if let Some(existing) = target {
            self.merge_row(&existing.id, &row)?;
            return Ok(ImportAction::Merged);
        }

        let now = self.clock.now();
        let id = match row.id.clone() {
            Some(id) => id,
            None => self.unused_id()?,
        };
        let mut customer = Customer::new(id, row.name.clone(), row.mobile.clone(), now);
        if let Some(registered) = row.registration_date {
            customer.registration_date = registered;
        }
        carry_stamps(&mut customer, row.stamps, row.completion_date, now);

        match self.store.insert_customer(customer) {
            Ok(()) => Ok(ImportAction::Created),
            // Lost a race with a concurrent insert of the same key.
            Err(AppError::DuplicateCustomer { id, .. }) => {
                self.merge_row(&id, &row)?;
                Ok(ImportAction::Merged)
            }
            Err(e) => Err(e),
        }
    }

    fn merge_row(&self, id: &str, row: &ValidRow) -> Result<()> {
        let now = self.clock.now();
        self.store.update_customer(id, &mut |c| {
            c.name = row.name.clone();
            carry_stamps(c, row.stamps, row.completion_date, now);
            c.updated_at = now;
            Ok(())
        })?;
        Ok(())
    }

    fn unused_id(&self) -> Result<String> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = generate_customer_id();
            if self.store.get_customer(&id)?.is_none() {
                return Ok(id);
            }
        }
        Err(AppError::Internal(anyhow::anyhow!(
            "No free customer id after {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }
}

enum ImportAction {
    Created,
    Merged,
}

/// Raise a card to `target` stamps without ever lowering it.
///
/// Missing history entries are attributed to the import. A card that
/// becomes complete takes the row's completion date, or `now`; a card that
/// was already complete keeps its original date.
fn carry_stamps(
    customer: &mut Customer,
    target: u8,
    completion_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) {
    let target = target.min(STAMPS_TO_COMPLETE);
    if target <= customer.stamps_received {
        return;
    }

    let stamped_at = completion_date.unwrap_or(now);
    for n in customer.stamps_received + 1..=target {
        customer.stamp_history.push(StampEntry {
            stamp_number: n,
            added_by: IMPORT_ACTOR.to_string(),
            added_date: stamped_at,
        });
    }
    customer.stamps_received = target;
    customer.last_stamp_date = Some(stamped_at);

    if customer.is_complete() && customer.completion_date.is_none() {
        customer.completion_date = Some(stamped_at);
    }
    customer.is_active = !customer.is_complete();
}

fn validate_row(row: ImportRow) -> std::result::Result<ValidRow, String> {
    let (Some(name), Some(mobile)) = (row.name, row.mobile) else {
        return Err("Name and mobile are required".to_string());
    };
    let name = validate_name(&name).map_err(|e| import_error_message(&e))?;
    let mobile = validate_mobile(&mobile).map_err(|e| import_error_message(&e))?;

    let stamps = match row.stamps_received.as_deref() {
        None => 0,
        Some(raw) => match raw.parse::<u8>() {
            Ok(n) if n <= STAMPS_TO_COMPLETE => n,
            _ => {
                return Err(format!(
                    "Stamps received must be a number from 0 to {}",
                    STAMPS_TO_COMPLETE
                ))
            }
        },
    };

    let parse_date = |raw: Option<String>, what: &str| match raw {
        None => Ok(None),
        Some(raw) => parse_flexible_date(&raw)
            .map(Some)
            .ok_or_else(|| format!("Invalid {what}: {raw}")),
    };
    let registration_date = parse_date(row.registration_date, "registration date")?;
    let completion_date = parse_date(row.completion_date, "completion date")?;
    if completion_date.is_some() && stamps < STAMPS_TO_COMPLETE {
        return Err(format!(
            "Completion date given for a card with {} of {} stamps",
            stamps, STAMPS_TO_COMPLETE
        ));
    }

    if let Some(raw) = row.status.as_deref() {
        let status = CardStatus::parse(raw).ok_or_else(|| format!("Unknown status: {raw}"))?;
        let complete = stamps >= STAMPS_TO_COMPLETE;
        if (status == CardStatus::Completed) != complete {
            return Err(format!(
                "Status {} does not match {} stamps",
                status.as_str(),
                stamps
            ));
        }
    }

    Ok(ValidRow {
        id: row.id.as_deref().map(normalize_id),
        name,
        mobile,
        registration_date,
        stamps,
        completion_date,
    })
}

fn import_error_message(e: &AppError) -> String {
    match e {
        AppError::Validation(msg) => msg.clone(),
        AppError::DuplicateCustomer { id, .. } => format!("Conflicts with customer {id}"),
        other => other.to_string(),
    }
}

/// Ids are stored upper-case.
fn normalize_id(id: &str) -> String {
    id.trim().to_ascii_uppercase()
}

/// `RK-` followed by six digits.
fn generate_customer_id() -> String {
    let n: u32 = rand::rng().random_range(100_000..=999_999);
    format!("RK-{n}")
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

/// Exactly ten ASCII digits.
pub fn validate_mobile(mobile: &str) -> Result<String> {
    let mobile = mobile.trim();
    if mobile.len() == 10 && mobile.bytes().all(|b| b.is_ascii_digit()) {
        Ok(mobile.to_string())
    } else {
        Err(AppError::Validation(
            "Invalid mobile number format: expected 10 digits".to_string(),
        ))
    }
}
