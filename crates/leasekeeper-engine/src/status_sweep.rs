// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Periodic status recomputation.
//!
//! Every lease is reclassified against the current time and only leases whose
//! status changed are written back. The write is conditional on the expiry
//! the new status was computed from, so a renewal that lands mid-sweep is
//! never overwritten with a stale status; such leases are counted as `stale`
//! and picked up by the next run.
//!
//! This sweep never sends notices.

use std::sync::Arc;
use std::time::Duration;

use leasekeeper_core::{Clock, LeaseStore, classify};
use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::schedule::Schedule;
use crate::sweep::{SweepOutcome, Ticker};

/// Configuration for the status sweep.
#[derive(Debug, Clone)]
pub struct StatusSweepConfig {
    /// When the sweep fires.
    pub schedule: Schedule,
    /// Sweep once as soon as the worker starts.
    pub run_on_start: bool,
}

impl Default for StatusSweepConfig {
    fn default() -> Self {
        Self {
            schedule: Schedule::Every(Duration::from_secs(3600)), // 1 hour
            run_on_start: true,
        }
    }
}

/// What one status sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSweepReport {
    /// Leases examined.
    pub scanned: usize,
    /// Leases whose status was rewritten.
    pub changed: usize,
    /// Leases whose expiry moved under the sweep; left for the next run.
    pub stale: usize,
    /// Leases whose write failed.
    pub failed: usize,
}

/// Background worker that keeps stored statuses in line with the clock.
pub struct StatusSweeper {
    store: Arc<dyn LeaseStore>,
    clock: Arc<dyn Clock>,
    config: StatusSweepConfig,
    running: Mutex<()>,
    shutdown: Arc<Notify>,
}

impl StatusSweeper {
    /// Create a new status sweeper.
    pub fn new(store: Arc<dyn LeaseStore>, clock: Arc<dyn Clock>, config: StatusSweepConfig) -> Self {
        Self {
            store,
            clock,
            config,
            running: Mutex::new(()),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the sweep loop until shutdown is signalled.
    pub async fn run(&self) {
        info!(schedule = ?self.config.schedule, "Status sweeper started");

        if self.config.run_on_start {
            self.sweep_logged().await;
        }

        let mut ticker = Ticker::new(self.config.schedule, self.clock.now());
        loop {
            let (fire_at, wait) = ticker.next(self.clock.now());

            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Status sweeper received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(wait) => {
                    ticker.fired(fire_at);
                    self.sweep_logged().await;
                }
            }
        }

        info!("Status sweeper stopped");
    }

    async fn sweep_logged(&self) {
        match self.sweep_once().await {
            Ok(SweepOutcome::Skipped) => {
                debug!("Status sweep still running, trigger skipped");
            }
            Ok(SweepOutcome::Completed(_)) => {}
            Err(e) => {
                error!(error = %e, "Status sweep failed");
            }
        }
    }

    /// Run one sweep now. Returns [`SweepOutcome::Skipped`] if a sweep is
    /// already in progress.
    pub async fn sweep_once(&self) -> Result<SweepOutcome<StatusSweepReport>> {
        let Ok(_guard) = self.running.try_lock() else {
            return Ok(SweepOutcome::Skipped);
        };

        let now = self.clock.now();
        let leases = self.store.scan_all().await?;
        let mut report = StatusSweepReport {
            scanned: leases.len(),
            ..Default::default()
        };

        for lease in leases {
            let lease = match lease {
                Ok(lease) => lease,
                Err(damaged) => {
                    report.failed += 1;
                    warn!(lease_id = %damaged.id, error = %damaged.error, "Unreadable lease skipped");
                    continue;
                }
            };

            let status = classify(lease.expire_at, now);
            if status == lease.status {
                continue;
            }

            match self
                .store
                .update_status(&lease.id, lease.expire_at, status)
                .await
            {
                Ok(true) => {
                    report.changed += 1;
                    debug!(
                        lease_id = %lease.id,
                        from = %lease.status,
                        to = %status,
                        "Lease status changed"
                    );
                }
                Ok(false) => {
                    report.stale += 1;
                    debug!(lease_id = %lease.id, "Lease changed during sweep, skipped");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(lease_id = %lease.id, error = %e, "Failed to update lease status");
                }
            }
        }

        info!(
            scanned = report.scanned,
            changed = report.changed,
            stale = report.stale,
            failed = report.failed,
            "Status sweep complete"
        );
        Ok(SweepOutcome::Completed(report))
    }
}
