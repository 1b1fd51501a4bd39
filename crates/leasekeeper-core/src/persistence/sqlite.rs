// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed lease store.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::debug;
use uuid::Uuid;

use crate::error::{LeaseError, Result};
use crate::records::{LeaseRecord, NewLease, RenewalRecord};
use crate::status::LeaseStatus;

use super::{
    EncodedCollections, LEASE_COLUMNS, LeaseRow, LeaseStore, RenewalRow, ScannedLease, into_records,
    scan_records,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// SQLite-backed lease store.
#[derive(Clone)]
pub struct SqliteLeaseStore {
    pool: SqlitePool,
}

impl SqliteLeaseStore {
    /// Wrap an existing, already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database file at `path` and migrate it.
    ///
    /// Parent directories are created as well.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LeaseError::DatabaseError {
                    operation: "create_dir".to_string(),
                    details: format!("Failed to create directory {:?}: {}", parent, e),
                })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        Self::connect(&url).await
    }

    /// Connect to a `sqlite:` URL and migrate.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| LeaseError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Invalid SQLite URL: {}", e),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to an in-memory database is a separate database,
        // so keep exactly one alive for the lifetime of the pool.
        let in_memory = url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if in_memory {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| LeaseError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite: {}", e),
            })?;

        MIGRATOR.run(&pool).await?;
        debug!(in_memory, "SQLite lease store ready");

        Ok(Self { pool })
    }

    /// Underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl LeaseStore for SqliteLeaseStore {
    async fn scan_all(&self) -> Result<Vec<ScannedLease>> {
        let rows = sqlx::query_as::<_, LeaseRow>(&format!(
            "SELECT {LEASE_COLUMNS} FROM leases ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(scan_records(rows))
    }

    async fn scan_by_status(&self, statuses: &[LeaseStatus]) -> Result<Vec<ScannedLease>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "SELECT {LEASE_COLUMNS} FROM leases WHERE status IN ({placeholders}) \
             ORDER BY expire_at ASC, id ASC"
        );

        let mut query = sqlx::query_as::<_, LeaseRow>(&sql);
        for status in statuses {
            query = query.bind(status.as_str());
        }

        Ok(scan_records(query.fetch_all(&self.pool).await?))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<LeaseRecord>> {
        let rows = sqlx::query_as::<_, LeaseRow>(&format!(
            "SELECT {LEASE_COLUMNS} FROM leases WHERE owner_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        into_records(rows)
    }

    async fn get(&self, id: &str) -> Result<Option<LeaseRecord>> {
        let row = sqlx::query_as::<_, LeaseRow>(&format!(
            "SELECT {LEASE_COLUMNS} FROM leases WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LeaseRecord::try_from).transpose()
    }

    async fn create(&self, lease: NewLease) -> Result<LeaseRecord> {
        lease.validate()?;

        let record = lease.into_record(Uuid::new_v4().to_string(), Utc::now());
        let encoded = EncodedCollections::of(&record)?;

        sqlx::query(
            r#"
            INSERT INTO leases (id, owner_id, raw_content, addresses, port, username, secret,
                                product_type, operating_system, configs, extras,
                                start_at, expire_at, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(&record.raw_content)
        .bind(&encoded.addresses)
        .bind(&record.port)
        .bind(&record.username)
        .bind(&record.secret)
        .bind(&record.product_type)
        .bind(&record.operating_system)
        .bind(&encoded.configs)
        .bind(&encoded.extras)
        .bind(record.start_at)
        .bind(record.expire_at)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update_status(
        &self,
        id: &str,
        expected_expire: DateTime<Utc>,
        status: LeaseStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE leases
            SET status = ?, updated_at = ?
            WHERE id = ? AND expire_at = ?
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(expected_expire)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn apply_renewal(&self, entry: &RenewalRecord, status: LeaseStatus) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE leases
            SET expire_at = ?, status = ?, updated_at = ?
            WHERE id = ? AND expire_at = ?
            "#,
        )
        .bind(entry.new_expire_at)
        .bind(status.as_str())
        .bind(entry.renewed_at)
        .bind(&entry.lease_id)
        .bind(entry.old_expire_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO lease_renewals (id, lease_id, renewed_at, old_expire_at, new_expire_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.lease_id)
        .bind(entry.renewed_at)
        .bind(entry.old_expire_at)
        .bind(entry.new_expire_at)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn append_audit(&self, entry: &RenewalRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO lease_renewals (id, lease_id, renewed_at, old_expire_at, new_expire_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.lease_id)
        .bind(entry.renewed_at)
        .bind(entry.old_expire_at)
        .bind(entry.new_expire_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_renewals(&self, lease_id: &str) -> Result<Vec<RenewalRecord>> {
        let rows = sqlx::query_as::<_, RenewalRow>(
            r#"
            SELECT id, lease_id, renewed_at, old_expire_at, new_expire_at
            FROM lease_renewals
            WHERE lease_id = ?
            ORDER BY renewed_at ASC, created_at ASC
            "#,
        )
        .bind(lease_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RenewalRecord::from).collect())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM lease_renewals WHERE lease_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM leases WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
