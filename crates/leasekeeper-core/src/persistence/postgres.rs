// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed lease store.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::debug;
use uuid::Uuid;

use crate::error::{LeaseError, Result};
use crate::records::{LeaseRecord, NewLease, RenewalRecord};
use crate::status::LeaseStatus;

use super::{
    EncodedCollections, LEASE_COLUMNS, LeaseRow, LeaseStore, RenewalRow, ScannedLease, into_records,
    scan_records,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/postgres");

/// PostgreSQL-backed lease store.
#[derive(Clone)]
pub struct PostgresLeaseStore {
    pool: PgPool,
}

impl PostgresLeaseStore {
    /// Wrap an existing, already migrated pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `url` and migrate.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(|e| LeaseError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to connect to PostgreSQL: {}", e),
            })?;

        MIGRATOR.run(&pool).await?;
        debug!("PostgreSQL lease store ready");

        Ok(Self { pool })
    }

    /// Underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl LeaseStore for PostgresLeaseStore {
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

        let tokens: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, LeaseRow>(&format!(
            "SELECT {LEASE_COLUMNS} FROM leases WHERE status = ANY($1) \
             ORDER BY expire_at ASC, id ASC"
        ))
        .bind(tokens)
        .fetch_all(&self.pool)
        .await?;

        Ok(scan_records(rows))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<LeaseRecord>> {
        let rows = sqlx::query_as::<_, LeaseRow>(&format!(
            "SELECT {LEASE_COLUMNS} FROM leases WHERE owner_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        into_records(rows)
    }

    async fn get(&self, id: &str) -> Result<Option<LeaseRecord>> {
        let row = sqlx::query_as::<_, LeaseRow>(&format!(
            "SELECT {LEASE_COLUMNS} FROM leases WHERE id = $1"
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
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
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
            SET status = $1, updated_at = NOW()
            WHERE id = $2 AND expire_at = $3
            "#,
        )
        .bind(status.as_str())
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
            SET expire_at = $1, status = $2, updated_at = $3
            WHERE id = $4 AND expire_at = $5
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
            INSERT INTO lease_renewals (id, lease_id, renewed_at, old_expire_at, new_expire_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.lease_id)
        .bind(entry.renewed_at)
        .bind(entry.old_expire_at)
        .bind(entry.new_expire_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn append_audit(&self, entry: &RenewalRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO lease_renewals (id, lease_id, renewed_at, old_expire_at, new_expire_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.lease_id)
        .bind(entry.renewed_at)
        .bind(entry.old_expire_at)
        .bind(entry.new_expire_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_renewals(&self, lease_id: &str) -> Result<Vec<RenewalRecord>> {
        let rows = sqlx::query_as::<_, RenewalRow>(
            r#"
            SELECT id, lease_id, renewed_at, old_expire_at, new_expire_at
            FROM lease_renewals
            WHERE lease_id = $1
            ORDER BY renewed_at ASC, created_at ASC
            "#,
        )
        .bind(lease_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RenewalRecord::from).collect())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        // lease_renewals cascades
        let result = sqlx::query("DELETE FROM leases WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
