// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable lifecycle runtime.
//!
//! [`LifecycleRuntime`] runs the status sweep and the notification sweep as
//! two independent tokio tasks. Each sweep skips a trigger while its own
//! previous run is still going; the two may overlap with each other.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use leasekeeper_core::connect_store;
//! use leasekeeper_engine::messaging::LoggingGateway;
//! use leasekeeper_engine::runtime::LifecycleRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = connect_store("sqlite:leases.db").await?;
//!
//!     let runtime = LifecycleRuntime::builder()
//!         .store(store)
//!         .gateway(Arc::new(LoggingGateway))
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     // ... run your application ...
//!
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use leasekeeper_core::{Clock, LeaseStore, SystemClock};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::messaging::{MessagingGateway, OwnerIdDirectory, RecipientDirectory};
use crate::notification_sweep::{NotificationReport, NotificationSweepConfig, NotificationSweeper};
use crate::schedule::Schedule;
use crate::status_sweep::{StatusSweepConfig, StatusSweepReport, StatusSweeper};
use crate::sweep::SweepOutcome;

/// Builder for creating a [`LifecycleRuntime`].
pub struct LifecycleRuntimeBuilder {
    store: Option<Arc<dyn LeaseStore>>,
    gateway: Option<Arc<dyn MessagingGateway>>,
    directory: Arc<dyn RecipientDirectory>,
    clock: Arc<dyn Clock>,
    status_schedule: Schedule,
    status_sweep_on_start: bool,
    notification_schedule: Schedule,
    notify_concurrency: usize,
    utc_offset: FixedOffset,
}

impl Default for LifecycleRuntimeBuilder {
    fn default() -> Self {
        Self {
            store: None,
            gateway: None,
            directory: Arc::new(OwnerIdDirectory),
            clock: Arc::new(SystemClock),
            status_schedule: Schedule::Every(Duration::from_secs(3600)), // 1 hour
            status_sweep_on_start: true,
            notification_schedule: Schedule::DailyAt {
                at: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
                offset: Utc.fix(),
            },
            notify_concurrency: 4,
            utc_offset: Utc.fix(),
        }
    }
}

impl LifecycleRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lease store (required).
    pub fn store(mut self, store: Arc<dyn LeaseStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the messaging gateway (required).
    pub fn gateway(mut self, gateway: Arc<dyn MessagingGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Set the owner → recipient lookup.
    ///
    /// Default: [`OwnerIdDirectory`]
    pub fn directory(mut self, directory: Arc<dyn RecipientDirectory>) -> Self {
        self.directory = directory;
        self
    }

    /// Set the time source.
    ///
    /// Default: [`SystemClock`]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the status sweep trigger.
    ///
    /// Default: every hour
    pub fn status_schedule(mut self, schedule: Schedule) -> Self {
        self.status_schedule = schedule;
        self
    }

    /// Whether the status sweep runs once as soon as the runtime starts.
    ///
    /// Default: true
    pub fn status_sweep_on_start(mut self, enabled: bool) -> Self {
        self.status_sweep_on_start = enabled;
        self
    }

    /// Set the notification sweep trigger.
    ///
    /// Default: daily at 09:00 UTC
    pub fn notification_schedule(mut self, schedule: Schedule) -> Self {
        self.notification_schedule = schedule;
        self
    }

    /// Set the number of notices delivered concurrently.
    ///
    /// Default: 4
    pub fn notify_concurrency(mut self, concurrency: usize) -> Self {
        self.notify_concurrency = concurrency;
        self
    }

    /// Set the zone used to render times in notices.
    ///
    /// Default: UTC
    pub fn utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// Take schedules, concurrency and zone from `config`.
    pub fn engine_config(self, config: &EngineConfig) -> Self {
        self.status_schedule(config.status_schedule())
            .notification_schedule(config.notification_schedule())
            .notify_concurrency(config.notify_concurrency)
            .utc_offset(config.utc_offset)
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<LifecycleRuntimeConfig> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("store is required"))?;
        let gateway = self
            .gateway
            .ok_or_else(|| anyhow::anyhow!("gateway is required"))?;
        if self.notify_concurrency == 0 {
            anyhow::bail!("notify_concurrency must be at least 1");
        }

        Ok(LifecycleRuntimeConfig {
            store,
            gateway,
            directory: self.directory,
            clock: self.clock,
            status: StatusSweepConfig {
                schedule: self.status_schedule,
                run_on_start: self.status_sweep_on_start,
            },
            notification: NotificationSweepConfig {
                schedule: self.notification_schedule,
                concurrency: self.notify_concurrency,
                offset: self.utc_offset,
            },
        })
    }
}

/// Configuration for a [`LifecycleRuntime`].
pub struct LifecycleRuntimeConfig {
    store: Arc<dyn LeaseStore>,
    gateway: Arc<dyn MessagingGateway>,
    directory: Arc<dyn RecipientDirectory>,
    clock: Arc<dyn Clock>,
    status: StatusSweepConfig,
    notification: NotificationSweepConfig,
}

impl LifecycleRuntimeConfig {
    /// Start the runtime, spawning both sweep workers.
    pub async fn start(self) -> Result<LifecycleRuntime> {
        let status_sweeper = Arc::new(StatusSweeper::new(
            self.store.clone(),
            self.clock.clone(),
            self.status.clone(),
        ));
        let status_shutdown = status_sweeper.shutdown_handle();
        let worker = status_sweeper.clone();
        let status_handle = tokio::spawn(async move {
            worker.run().await;
        });

        let notification_sweeper = Arc::new(NotificationSweeper::new(
            self.store,
            self.gateway,
            self.directory,
            self.clock,
            self.notification.clone(),
        ));
        let notification_shutdown = notification_sweeper.shutdown_handle();
        let worker = notification_sweeper.clone();
        let notification_handle = tokio::spawn(async move {
            worker.run().await;
        });

        info!(
            status_schedule = ?self.status.schedule,
            notification_schedule = ?self.notification.schedule,
            notify_concurrency = self.notification.concurrency,
            "LifecycleRuntime started"
        );

        Ok(LifecycleRuntime {
            status_sweeper,
            notification_sweeper,
            status_handle,
            notification_handle,
            status_shutdown,
            notification_shutdown,
        })
    }
}

/// A running lifecycle engine.
///
/// Call [`shutdown`](Self::shutdown) for graceful termination. A sweep in
/// progress at that point finishes before its worker exits.
pub struct LifecycleRuntime {
    status_sweeper: Arc<StatusSweeper>,
    notification_sweeper: Arc<NotificationSweeper>,
    status_handle: JoinHandle<()>,
    notification_handle: JoinHandle<()>,
    status_shutdown: Arc<Notify>,
    notification_shutdown: Arc<Notify>,
}

impl LifecycleRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> LifecycleRuntimeBuilder {
        LifecycleRuntimeBuilder::new()
    }

    /// Run a status sweep now, outside the schedule.
    pub async fn trigger_status_sweep(&self) -> crate::Result<SweepOutcome<StatusSweepReport>> {
        self.status_sweeper.sweep_once().await
    }

    /// Run a notification sweep now, outside the schedule.
    pub async fn trigger_notification_sweep(
        &self,
    ) -> crate::Result<SweepOutcome<NotificationReport>> {
        self.notification_sweeper.sweep_once().await
    }

    /// Gracefully shut down the runtime.
    pub async fn shutdown(self) -> Result<()> {
        info!("LifecycleRuntime shutting down...");

        self.status_shutdown.notify_one();
        self.notification_shutdown.notify_one();

        let mut panicked = false;

        if let Err(e) = self.status_handle.await {
            error!("Status sweeper task panicked: {}", e);
            panicked = true;
        }

        if let Err(e) = self.notification_handle.await {
            error!("Notification sweeper task panicked: {}", e);
            panicked = true;
        }

        if panicked {
            anyhow::bail!("a sweeper task panicked");
        }

        info!("LifecycleRuntime shutdown complete");
        Ok(())
    }

    /// Check if both workers are still running.
    pub fn is_running(&self) -> bool {
        !self.status_handle.is_finished() && !self.notification_handle.is_finished()
    }
}
