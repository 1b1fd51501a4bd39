// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lease record store interface and backends.
//!
//! The store is the only component that touches the database. Every
//! mutation of a single lease is one statement or one transaction, so an
//! observer never sees a new expiry paired with a stale status.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresLeaseStore;
pub use self::sqlite::SqliteLeaseStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{LeaseError, Result};
use crate::parser::ExtraFields;
use crate::records::{LeaseRecord, NewLease, RenewalRecord};
use crate::status::LeaseStatus;

/// Column list shared by every lease query.
pub(crate) const LEASE_COLUMNS: &str = "id, owner_id, raw_content, addresses, port, username, \
     secret, product_type, operating_system, configs, extras, start_at, expire_at, status, \
     created_at, updated_at";

/// Persistence interface consumed by the renewal service and the sweeps.
///
/// The `scan_*` methods decode each row on its own, so one damaged row does
/// not hide the rest. The `list_*` methods fail on the first damaged row.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Every lease, oldest first, decoded row by row.
    async fn scan_all(&self) -> Result<Vec<ScannedLease>>;

    /// Leases whose stored status is one of `statuses`, decoded row by row.
    async fn scan_by_status(&self, statuses: &[LeaseStatus]) -> Result<Vec<ScannedLease>>;

    /// Every lease, oldest first.
    async fn list_all(&self) -> Result<Vec<LeaseRecord>> {
        collect_scanned(self.scan_all().await?)
    }

    /// Leases whose stored status is one of `statuses`.
    async fn list_by_status(&self, statuses: &[LeaseStatus]) -> Result<Vec<LeaseRecord>> {
        collect_scanned(self.scan_by_status(statuses).await?)
    }

    /// Leases held by `owner_id`.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<LeaseRecord>>;

    /// Fetch one lease.
    async fn get(&self, id: &str) -> Result<Option<LeaseRecord>>;

    /// Validate and insert a new lease, assigning its id.
    async fn create(&self, lease: NewLease) -> Result<LeaseRecord>;

    /// Set the status of `id`, but only while its expiry is still
    /// `expected_expire`. Returns `false` if the lease is gone or its expiry
    /// moved since the status was computed.
    async fn update_status(
        &self,
        id: &str,
        expected_expire: DateTime<Utc>,
        status: LeaseStatus,
    ) -> Result<bool>;

    /// Move the lease from `entry.old_expire_at` to `entry.new_expire_at`,
    /// store `status` and append `entry`, all in one transaction. Returns
    /// `false` (and changes nothing) if the stored expiry is no longer
    /// `entry.old_expire_at`.
    async fn apply_renewal(&self, entry: &RenewalRecord, status: LeaseStatus) -> Result<bool>;

    /// Append an audit entry on its own.
    async fn append_audit(&self, entry: &RenewalRecord) -> Result<()>;

    /// Renewal history of a lease, oldest first.
    async fn list_renewals(&self, lease_id: &str) -> Result<Vec<RenewalRecord>>;

    /// Remove a lease and its history. Returns `false` if it did not exist.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// A stored lease row that could not be turned into a [`LeaseRecord`].
#[derive(Debug)]
pub struct UndecodableLease {
    /// Id of the damaged row.
    pub id: String,
    /// What went wrong while decoding it.
    pub error: LeaseError,
}

/// One row of a scan.
pub type ScannedLease = std::result::Result<LeaseRecord, UndecodableLease>;

fn collect_scanned(scanned: Vec<ScannedLease>) -> Result<Vec<LeaseRecord>> {
    scanned
        .into_iter()
        .map(|lease| lease.map_err(|damaged| damaged.error))
        .collect()
}

/// Open a store for `url`, picking the backend by scheme and running
/// migrations.
pub async fn connect_store(url: &str) -> Result<Arc<dyn LeaseStore>> {
    if url.starts_with("sqlite:") {
        Ok(Arc::new(SqliteLeaseStore::connect(url).await?))
    } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Ok(Arc::new(PostgresLeaseStore::connect(url).await?))
    } else {
        Err(LeaseError::validation(
            "database_url",
            "unsupported database scheme",
        ))
    }
}

/// Raw `leases` row; JSON columns are still text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct LeaseRow {
    pub id: String,
    pub owner_id: String,
    pub raw_content: String,
    pub addresses: String,
    pub port: String,
    pub username: String,
    pub secret: String,
    pub product_type: String,
    pub operating_system: String,
    pub configs: String,
    pub extras: String,
    pub start_at: DateTime<Utc>,
    pub expire_at: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<LeaseRow> for LeaseRecord {
    type Error = LeaseError;

    fn try_from(row: LeaseRow) -> Result<Self> {
        let addresses: Vec<String> = serde_json::from_str(&row.addresses)?;
        let configs: Vec<String> = serde_json::from_str(&row.configs)?;
        let extras: ExtraFields = serde_json::from_str(&row.extras)?;
        let status = row.status.parse::<LeaseStatus>()?;

        Ok(LeaseRecord {
            id: row.id,
            owner_id: row.owner_id,
            raw_content: row.raw_content,
            addresses,
            port: row.port,
            username: row.username,
            secret: row.secret,
            product_type: row.product_type,
            operating_system: row.operating_system,
            configs,
            extras,
            start_at: row.start_at,
            expire_at: row.expire_at,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn into_records(rows: Vec<LeaseRow>) -> Result<Vec<LeaseRecord>> {
    rows.into_iter().map(LeaseRecord::try_from).collect()
}

pub(crate) fn scan_records(rows: Vec<LeaseRow>) -> Vec<ScannedLease> {
    rows.into_iter()
        .map(|row| {
            let id = row.id.clone();
            LeaseRecord::try_from(row).map_err(|error| UndecodableLease { id, error })
        })
        .collect()
}

/// `addresses`, `configs` and `extras` as the JSON text they are stored as.
pub(crate) struct EncodedCollections {
    pub addresses: String,
    pub configs: String,
    pub extras: String,
}

impl EncodedCollections {
    pub fn of(record: &LeaseRecord) -> Result<Self> {
        Ok(Self {
            addresses: serde_json::to_string(&record.addresses)?,
            configs: serde_json::to_string(&record.configs)?,
            extras: serde_json::to_string(&record.extras)?,
        })
    }
}

/// Renewal history row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct RenewalRow {
    pub id: String,
    pub lease_id: String,
    pub renewed_at: DateTime<Utc>,
    pub old_expire_at: DateTime<Utc>,
    pub new_expire_at: DateTime<Utc>,
}

impl From<RenewalRow> for RenewalRecord {
    fn from(row: RenewalRow) -> Self {
        RenewalRecord {
            id: row.id,
            lease_id: row.lease_id,
            renewed_at: row.renewed_at,
            old_expire_at: row.old_expire_at,
            new_expire_at: row.new_expire_at,
        }
    }
}
