// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! Outgoing customer messages (WhatsApp, SMS, email).
//!
//! The ledger only ever logs the outcome of a send; nothing here can fail a
//! stamp or a registration.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    WhatsApp,
    Sms,
    Email,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::WhatsApp => "whatsapp",
            Channel::Sms => "sms",
            Channel::Email => "email",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whatsapp" => Ok(Channel::WhatsApp),
            "sms" => Ok(Channel::Sms),
            "email" => Ok(Channel::Email),
            other => Err(NotifyError::UnsupportedChannel(other.to_string())),
        }
    }
}

/// Where a message goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub channel: Channel,
    /// Phone number with country code, or an email address
    pub address: String,
}

/// Successful hand-off to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub provider_id: Option<String>,
    /// True when no provider is configured and the message was only logged
    pub simulated: bool,
}

/// Notification errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Unsupported channel: {0}")]
    UnsupportedChannel(String),

    #[error("Provider rejected message: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Message sender.
pub trait Notifier: Send + Sync {
    fn send<'a>(
        &'a self,
        destination: &'a Destination,
        message: &'a str,
    ) -> BoxFuture<'a, Result<Delivery, NotifyError>>;
}

/// Simulation mode: log the message and report success.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send<'a>(
        &'a self,
        destination: &'a Destination,
        message: &'a str,
    ) -> BoxFuture<'a, Result<Delivery, NotifyError>> {
        Box::pin(async move {
            tracing::info!(
                channel = %destination.channel,
                to = %destination.address,
                message,
                "Notification simulation"
            );
            Ok(Delivery {
                provider_id: None,
                simulated: true,
            })
        })
    }
}

/// Relay request body.
#[derive(Serialize)]
struct RelayRequest<'a> {
    channel: Channel,
    to: &'a str,
    message: &'a str,
}

/// Relay response body.
#[derive(Deserialize)]
struct RelayResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Posts messages to an HTTP relay that fronts the SMS/WhatsApp/email
/// providers.
#[derive(Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }
}

impl Notifier for WebhookNotifier {
    fn send<'a>(
        &'a self,
        destination: &'a Destination,
        message: &'a str,
    ) -> BoxFuture<'a, Result<Delivery, NotifyError>> {
        Box::pin(async move {
            let response = self
                .http
                .post(&self.url)
                .json(&RelayRequest {
                    channel: destination.channel,
                    to: &destination.address,
                    message,
                })
                .send()
                .await
                .map_err(|e| NotifyError::Transport(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(NotifyError::Rejected(format!("HTTP {}: {}", status, body)));
            }

            let body: RelayResponse = response
                .json()
                .await
                .map_err(|e| NotifyError::Transport(format!("JSON parse error: {}", e)))?;

            tracing::info!(
                channel = %destination.channel,
                provider_id = ?body.id,
                "Notification delivered to relay"
            );

            Ok(Delivery {
                provider_id: body.id,
                simulated: false,
            })
        })
    }
}

/// Welcome message sent when a card is shared.
pub fn welcome_message(customer_id: &str, stamps: u8) -> String {
    format!(
        "🐉 Welcome to RK Dragon Panipuri Loyalty Program! Your Customer ID: {customer_id}. \
         Progress: {stamps}/6 stamps. Collect 6 dragon stamps to earn rewards! 🎁"
    )
}

/// Message sent when a card is completed.
pub fn completion_message(name: &str) -> String {
    format!(
        "🎉 Congratulations {name}! You've completed your RK Dragon Panipuri loyalty card. \
         Visit us to claim your reward! 🐉"
    )
}
