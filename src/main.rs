// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! RK Dragon Loyalty API Server
//!
//! Serves the loyalty-card API for the shop's admin frontend.

use rk_loyalty::{
    config::Config,
    db::{MemoryStore, Store},
    services::{LogNotifier, Notifier, WebhookNotifier},
    time_utils::SystemClock,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting RK Dragon Loyalty API");

    // Open the store
    let store: Arc<dyn Store> = match &config.data_file {
        Some(path) => Arc::new(MemoryStore::open(path)?),
        None => {
            tracing::warn!("DATA_FILE not set, records will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Pick the notification backend
    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Notification relay configured");
            Arc::new(WebhookNotifier::new(url.clone()))
        }
        None => {
            tracing::info!("No notification relay configured, running in simulation mode");
            Arc::new(LogNotifier)
        }
    };
    tracing::info!(channels = ?config.notify_channels, "Completion notification channels");

    // Build shared state
    let state = Arc::new(AppState::new(
        config.clone(),
        store,
        notifier,
        Arc::new(SystemClock),
    ));

    // Build router
    let app = rk_loyalty::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rk_loyalty=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
