// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! Administrator account and session models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Administrator account. Only hashes are ever stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAccount {
    pub username: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub security_questions: Vec<SecurityQuestion>,
    pub login_attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    /// Bumped on every password change; reset tokens carry the version
    /// they were issued for.
    pub credential_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdminAccount {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until > now)
    }
}

/// A security question with its hashed (normalised) answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityQuestion {
    pub question: String,
    pub answer_hash: String,
}

/// Server-side record of a login session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSession {
    /// Random session identifier (base64url)
    pub id: String,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
    pub remember_me: bool,
    #[serde(default)]
    pub device: DeviceInfo,
}

impl AdminSession {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now < self.expires_at
    }
}

/// Client details recorded at login. Informational only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub platform: Option<String>,
}
