// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! Customer loyalty-card model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Number of stamps that completes a loyalty card.
pub const STAMPS_TO_COMPLETE: u8 = 6;

/// Customer record.
///
/// Invariants maintained by the ledger:
/// - `stamps_received` never decreases and never exceeds [`STAMPS_TO_COMPLETE`]
/// - `completion_date.is_some()` iff the card is complete
/// - `is_active == !complete`
/// - `stamp_history.len() == stamps_received`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Customer {
    /// Upper-cased customer ID (`RK-123456` when generated)
    pub id: String,
    pub name: String,
    /// 10-digit mobile number (business key)
    pub mobile: String,
    pub registration_date: DateTime<Utc>,
    pub stamps_received: u8,
    pub completion_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub last_stamp_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stamp_history: Vec<StampEntry>,
    #[serde(default)]
    pub notification_preferences: NotificationPreferences,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One stamp added to a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StampEntry {
    pub stamp_number: u8,
    /// Admin username, or `import` for stamps carried in by CSV
    pub added_by: String,
    pub added_date: DateTime<Utc>,
}

/// Which channels a customer accepts notifications on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct NotificationPreferences {
    pub whatsapp: bool,
    pub email: bool,
    pub sms: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            whatsapp: true,
            email: true,
            sms: true,
        }
    }
}

/// Card status as shown in exports and list filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardStatus {
    Active,
    Completed,
}

impl CardStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CardStatus::Active => "Active",
            CardStatus::Completed => "Completed",
        }
    }

    /// Parse the `Status` CSV column (case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(CardStatus::Active),
            "completed" | "complete" => Some(CardStatus::Completed),
            _ => None,
        }
    }
}

impl Customer {
    /// A fresh card with no stamps.
    pub fn new(id: String, name: String, mobile: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            mobile,
            registration_date: now,
            stamps_received: 0,
            completion_date: None,
            is_active: true,
            last_stamp_date: None,
            stamp_history: Vec::new(),
            notification_preferences: NotificationPreferences::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stamps_received >= STAMPS_TO_COMPLETE
    }

    pub fn status(&self) -> CardStatus {
        if self.is_complete() {
            CardStatus::Completed
        } else {
            CardStatus::Active
        }
    }

    /// Append one stamp. Returns `true` if this stamp completed the card.
    ///
    /// Callers must check [`Customer::is_complete`] first; a completed card
    /// is left untouched and `false` is returned.
    pub fn push_stamp(&mut self, added_by: &str, now: DateTime<Utc>) -> bool {
        if self.is_complete() {
            return false;
        }

        self.stamps_received += 1;
        self.stamp_history.push(StampEntry {
            stamp_number: self.stamps_received,
            added_by: added_by.to_string(),
            added_date: now,
        });
        self.last_stamp_date = Some(now);
        self.updated_at = now;

        if self.is_complete() {
            self.completion_date = Some(now);
            self.is_active = false;
            return true;
        }
        false
    }
}
