// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fleet-wide summary of tracked leases.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::records::LeaseRecord;
use crate::status::LeaseStatus;

/// Label used when a product type or operating system was never recorded.
pub const UNKNOWN_LABEL: &str = "未知";

/// Counts across every lease.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LeaseSummary {
    /// Number of leases.
    pub total: usize,
    /// Per-owner breakdown, ordered by owner id.
    pub owners: Vec<OwnerSummary>,
    /// Leases per operating system.
    pub systems: BTreeMap<String, usize>,
    /// Occurrences of each configuration line.
    pub configs: BTreeMap<String, usize>,
    /// Leases per stored status.
    pub statuses: BTreeMap<LeaseStatus, usize>,
}

/// Leases held by one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerSummary {
    /// Owner id.
    pub owner_id: String,
    /// Number of leases held.
    pub lease_count: usize,
    /// The leases themselves, without credentials.
    pub leases: Vec<LeaseOverview>,
}

/// Credential-free view of one lease.
#[allow(missing_docs)] // Fields mirror LeaseRecord
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaseOverview {
    pub id: String,
    pub addresses: Vec<String>,
    pub port: String,
    pub username: String,
    pub product_type: String,
    pub operating_system: String,
    pub configs: Vec<String>,
    pub status: LeaseStatus,
    pub expire_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

fn label(value: &str) -> String {
    if value.trim().is_empty() {
        UNKNOWN_LABEL.to_string()
    } else {
        value.to_string()
    }
}

/// Summarize `leases`.
pub fn summarize(leases: &[LeaseRecord]) -> LeaseSummary {
    let mut owners: BTreeMap<&str, OwnerSummary> = BTreeMap::new();
    let mut summary = LeaseSummary {
        total: leases.len(),
        ..Default::default()
    };

    for lease in leases {
        let system = label(&lease.operating_system);
        *summary.systems.entry(system.clone()).or_default() += 1;
        *summary.statuses.entry(lease.status).or_default() += 1;
        for config in &lease.configs {
            *summary.configs.entry(config.clone()).or_default() += 1;
        }

        let owner = owners
            .entry(lease.owner_id.as_str())
            .or_insert_with(|| OwnerSummary {
                owner_id: lease.owner_id.clone(),
                lease_count: 0,
                leases: Vec::new(),
            });
        owner.lease_count += 1;
        owner.leases.push(LeaseOverview {
            id: lease.id.clone(),
            addresses: lease.addresses.clone(),
            port: lease.port.clone(),
            username: lease.username.clone(),
            product_type: label(&lease.product_type),
            operating_system: system,
            configs: lease.configs.clone(),
            status: lease.status,
            expire_at: lease.expire_at,
            created_at: lease.created_at,
        });
    }

    summary.owners = owners.into_values().collect();
    summary
}
