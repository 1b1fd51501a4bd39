// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Daily expiry notices.
//!
//! Selects leases by their *stored* status (pending, expiring or expired),
//! composes one notice each and hands them to the gateway through a bounded
//! pool of delivery tasks. A failed delivery is logged and counted; it does
//! not stop the sweep and is not retried until the next scheduled run.

use std::sync::Arc;

use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use leasekeeper_core::{Clock, LeaseStatus, LeaseStore};
use serde::Serialize;
use tokio::sync::{Mutex, Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::messaging::{MessagingGateway, RecipientDirectory};
use crate::notice::compose_notice;
use crate::schedule::Schedule;
use crate::sweep::{SweepOutcome, Ticker};

/// Configuration for the notification sweep.
#[derive(Debug, Clone)]
pub struct NotificationSweepConfig {
    /// When the sweep fires.
    pub schedule: Schedule,
    /// Deliveries in flight at once.
    pub concurrency: usize,
    /// Zone used to render times in notices.
    pub offset: FixedOffset,
}

impl Default for NotificationSweepConfig {
    fn default() -> Self {
        Self {
            schedule: Schedule::DailyAt {
                at: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
                offset: Utc.fix(),
            },
            concurrency: 4,
            offset: Utc.fix(),
        }
    }
}

/// What one notification sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationReport {
    /// Leases in a notifiable status.
    pub scanned: usize,
    /// Notices handed to the gateway.
    pub attempted: usize,
    /// Notices the gateway accepted.
    pub delivered: usize,
    /// Notices the gateway rejected or could not take.
    pub failed: usize,
    /// Leases whose owner has no known recipient.
    pub unresolved: usize,
}

/// Background worker that tells owners about leases running out.
pub struct NotificationSweeper {
    store: Arc<dyn LeaseStore>,
    gateway: Arc<dyn MessagingGateway>,
    directory: Arc<dyn RecipientDirectory>,
    clock: Arc<dyn Clock>,
    config: NotificationSweepConfig,
    running: Mutex<()>,
    shutdown: Arc<Notify>,
}

impl NotificationSweeper {
    /// Create a new notification sweeper.
    pub fn new(
        store: Arc<dyn LeaseStore>,
        gateway: Arc<dyn MessagingGateway>,
        directory: Arc<dyn RecipientDirectory>,
        clock: Arc<dyn Clock>,
        config: NotificationSweepConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            directory,
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
        info!(
            schedule = ?self.config.schedule,
            concurrency = self.config.concurrency,
            "Notification sweeper started"
        );

        let mut ticker = Ticker::new(self.config.schedule, self.clock.now());
        loop {
            let (fire_at, wait) = ticker.next(self.clock.now());
            debug!(next_run = %fire_at, "Notification sweep scheduled");

            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Notification sweeper received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(wait) => {
                    ticker.fired(fire_at);
                    match self.sweep_once().await {
                        Ok(SweepOutcome::Skipped) => {
                            debug!("Notification sweep still running, trigger skipped");
                        }
                        Ok(SweepOutcome::Completed(_)) => {}
                        Err(e) => {
                            error!(error = %e, "Notification sweep failed");
                        }
                    }
                }
            }
        }

        info!("Notification sweeper stopped");
    }

    /// Run one sweep now. Returns [`SweepOutcome::Skipped`] if a sweep is
    /// already in progress.
    pub async fn sweep_once(&self) -> Result<SweepOutcome<NotificationReport>> {
        let Ok(_guard) = self.running.try_lock() else {
            return Ok(SweepOutcome::Skipped);
        };

        let now = self.clock.now();
        let leases = self.store.scan_by_status(&LeaseStatus::NOTIFIABLE).await?;
        let mut report = NotificationReport {
            scanned: leases.len(),
            ..Default::default()
        };

        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut deliveries = JoinSet::new();

        for lease in leases {
            let lease = match lease {
                Ok(lease) => lease,
                Err(damaged) => {
                    report.failed += 1;
                    warn!(lease_id = %damaged.id, error = %damaged.error, "Unreadable lease skipped");
                    continue;
                }
            };
            let Some(notice) = compose_notice(&lease, now, self.config.offset) else {
                continue;
            };
            let Some(recipient) = self.directory.resolve(&lease.owner_id).await else {
                report.unresolved += 1;
                warn!(
                    lease_id = %lease.id,
                    owner_id = %lease.owner_id,
                    "No recipient for lease owner, notice not sent"
                );
                continue;
            };

            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::Other(format!("delivery pool closed: {}", e)))?;
            let gateway = self.gateway.clone();
            report.attempted += 1;

            deliveries.spawn(async move {
                let _permit = permit;
                let result = gateway.send(&recipient, &notice.text, notice.format).await;
                (lease.id, lease.owner_id, lease.status, result)
            });
        }

        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok((lease_id, owner_id, status, Ok(()))) => {
                    report.delivered += 1;
                    debug!(
                        lease_id = %lease_id,
                        owner_id = %owner_id,
                        status = %status,
                        "Notice delivered"
                    );
                }
                Ok((lease_id, owner_id, _, Err(e))) => {
                    report.failed += 1;
                    warn!(
                        lease_id = %lease_id,
                        owner_id = %owner_id,
                        error = %e,
                        "Notice delivery failed"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    error!("Notice delivery task panicked: {}", e);
                }
            }
        }

        info!(
            scanned = report.scanned,
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            unresolved = report.unresolved,
            "Notification sweep complete"
        );
        Ok(SweepOutcome::Completed(report))
    }
}
