// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Privileged renewal and deletion of leases.
//!
//! A renewal extends a lease by one calendar month. Renewing before expiry
//! extends from the current deadline; renewing an already expired lease
//! extends from now. The new expiry, the recomputed status and the audit
//! entry are written in one store transaction.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::PrivilegeCheck;
use crate::clock::Clock;
use crate::error::{LeaseError, Result};
use crate::expiry::compute_expiry;
use crate::persistence::LeaseStore;
use crate::records::{LeaseRecord, RenewalRecord};
use crate::status::{LeaseStatus, classify};

/// How often a renewal re-reads the lease after losing a race on its expiry.
const MAX_RENEWAL_ATTEMPTS: usize = 3;

/// Result of a successful renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenewalOutcome {
    /// Expiry before the renewal.
    pub old_expire: DateTime<Utc>,
    /// Expiry after the renewal.
    pub new_expire: DateTime<Utc>,
    /// Status computed from the new expiry.
    pub status: LeaseStatus,
}

/// Renews and deletes leases on behalf of an administrator.
pub struct RenewalService {
    store: Arc<dyn LeaseStore>,
    privilege: Arc<dyn PrivilegeCheck>,
    clock: Arc<dyn Clock>,
}

impl RenewalService {
    /// Create a renewal service.
    pub fn new(
        store: Arc<dyn LeaseStore>,
        privilege: Arc<dyn PrivilegeCheck>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            privilege,
            clock,
        }
    }

    /// Extend `lease_id` by one month.
    ///
    /// Fails with `Unauthorized` before looking the lease up, and with
    /// `LeaseNotFound` if it does not exist; neither touches the store.
    pub async fn renew(&self, lease_id: &str, secret: &str) -> Result<RenewalOutcome> {
        self.authorize("renew", secret)?;

        for attempt in 1..=MAX_RENEWAL_ATTEMPTS {
            let lease = self.require(lease_id).await?;
            let now = self.clock.now().trunc_subsecs(0);

            let base = if now > lease.expire_at {
                now
            } else {
                lease.expire_at
            };
            let new_expire = compute_expiry(base);
            let status = classify(new_expire, now);
            let entry = RenewalRecord::new(lease_id, now, lease.expire_at, new_expire);

            if self.store.apply_renewal(&entry, status).await? {
                info!(
                    lease_id = %lease_id,
                    old_expire = %lease.expire_at,
                    new_expire = %new_expire,
                    status = %status,
                    "Lease renewed"
                );
                return Ok(RenewalOutcome {
                    old_expire: lease.expire_at,
                    new_expire,
                    status,
                });
            }

            debug!(lease_id = %lease_id, attempt, "Lease expiry changed concurrently, retrying renewal");
        }

        warn!(lease_id = %lease_id, "Giving up renewal after repeated concurrent changes");
        Err(LeaseError::DatabaseError {
            operation: "renew".to_string(),
            details: format!(
                "expiry of lease '{}' changed concurrently {} times",
                lease_id, MAX_RENEWAL_ATTEMPTS
            ),
        })
    }

    /// Remove `lease_id` and its renewal history.
    pub async fn delete(&self, lease_id: &str, secret: &str) -> Result<()> {
        self.authorize("delete", secret)?;

        if !self.store.delete(lease_id).await? {
            return Err(LeaseError::LeaseNotFound {
                lease_id: lease_id.to_string(),
            });
        }

        info!(lease_id = %lease_id, "Lease deleted");
        Ok(())
    }

    /// Renewal history of `lease_id`, oldest first.
    pub async fn history(&self, lease_id: &str) -> Result<Vec<RenewalRecord>> {
        self.require(lease_id).await?;
        self.store.list_renewals(lease_id).await
    }

    fn authorize(&self, operation: &'static str, secret: &str) -> Result<()> {
        if self.privilege.is_privileged(secret) {
            Ok(())
        } else {
            warn!(operation, "Rejected privileged operation");
            Err(LeaseError::Unauthorized { operation })
        }
    }

    async fn require(&self, lease_id: &str) -> Result<LeaseRecord> {
        self.store
            .get(lease_id)
            .await?
            .ok_or_else(|| LeaseError::LeaseNotFound {
                lease_id: lease_id.to_string(),
            })
    }
}
