// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! Application configuration loaded from environment variables.

use crate::services::notifier::Channel;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Minimum length of the JWT signing key in bytes.
const MIN_SIGNING_KEY_LEN: usize = 32;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL (CORS origin, cookie security)
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// JWT signing key for session and reset tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// JSON snapshot file for the customer/admin store. `None` keeps
    /// everything in memory.
    pub data_file: Option<PathBuf>,
    /// Channels used for completion notifications
    pub notify_channels: Vec<Channel>,
    /// Relay endpoint for outgoing messages. `None` means simulation mode.
    pub notify_webhook_url: Option<String>,
    /// Upper bound on a single notification send
    pub notify_timeout: Duration,
    /// Prefix for mobile numbers when addressing WhatsApp/SMS
    pub country_code: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honoured for local
    /// development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = env::var("JWT_SIGNING_KEY")
            .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
            .trim()
            .as_bytes()
            .to_vec();
        if jwt_signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(ConfigError::Invalid {
                name: "JWT_SIGNING_KEY",
                reason: format!("must be at least {MIN_SIGNING_KEY_LEN} bytes"),
            });
        }

        let notify_channels = match env::var("NOTIFY_CHANNELS") {
            Ok(raw) => parse_channels(&raw)?,
            Err(_) => vec![Channel::WhatsApp],
        };

        let notify_timeout_secs = match env::var("NOTIFY_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "NOTIFY_TIMEOUT_SECS",
                reason: format!("not a number: {raw}"),
            })?,
            Err(_) => 10,
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            jwt_signing_key,
            data_file: env::var("DATA_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            notify_channels,
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            notify_timeout: Duration::from_secs(notify_timeout_secs),
            country_code: env::var("COUNTRY_CODE").unwrap_or_else(|_| "+91".to_string()),
        })
    }

    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!!".to_vec(),
            data_file: None,
            notify_channels: vec![Channel::WhatsApp],
            notify_webhook_url: None,
            notify_timeout: Duration::from_secs(2),
            country_code: "+91".to_string(),
        }
    }

    /// Whether auth cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.frontend_url.starts_with("https://")
    }
}

fn parse_channels(raw: &str) -> Result<Vec<Channel>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| {
            name.parse::<Channel>().map_err(|_| ConfigError::Invalid {
                name: "NOTIFY_CHANNELS",
                reason: format!("unknown channel '{name}'"),
            })
        })
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
