// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Leasekeeper - lease lifecycle daemon
//!
//! Keeps lease statuses current and sends daily expiry notices:
//! - Status sweep on a fixed interval
//! - Notification sweep once a day at a local time
//! - Telegram delivery when a bot token is configured, log-only otherwise

use tracing::{info, warn};

use leasekeeper_core::config::Config;
use leasekeeper_core::connect_store;
use leasekeeper_engine::config::EngineConfig;
use leasekeeper_engine::runtime::LifecycleRuntime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leasekeeper_engine=info,leasekeeper_core=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    // Load configuration
    let config = Config::from_env()?;
    let engine = EngineConfig::from_env()?;

    info!(
        status_sweep_interval_secs = engine.status_sweep_interval.as_secs(),
        notify_at = %engine.notify_at,
        utc_offset = %engine.utc_offset,
        telegram = engine.telegram_bot_token.is_some(),
        "Starting Leasekeeper"
    );

    // Connect to database and run migrations
    let store = connect_store(&config.database_url).await?;
    info!("Connected to database");

    if engine.telegram_bot_token.is_none() {
        warn!("LEASEKEEPER_TELEGRAM_BOT_TOKEN not set, notices will only be logged");
    }

    // Start the runtime
    let runtime = LifecycleRuntime::builder()
        .store(store)
        .gateway(engine.messaging_gateway())
        .engine_config(&engine)
        .build()?
        .start()
        .await?;

    info!("Leasekeeper ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Graceful shutdown
    runtime.shutdown().await?;

    info!("Leasekeeper shut down");

    Ok(())
}
