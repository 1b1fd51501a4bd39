// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lease and renewal audit records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LeaseError, Result};
use crate::parser::ExtraFields;
use crate::status::LeaseStatus;

/// A tracked lease as stored.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// Unique lease identifier.
    pub id: String,
    /// Requesting user; lookup only.
    pub owner_id: String,
    /// Provisioning text the lease was created from.
    pub raw_content: String,
    /// IPv4 addresses, in provisioning order.
    pub addresses: Vec<String>,
    /// Remote access port.
    pub port: String,
    /// Remote access username.
    pub username: String,
    /// Remote access password. Never logged or serialized.
    #[serde(skip_serializing, default)]
    pub secret: String,
    /// Product line, e.g. `100M+10M`.
    pub product_type: String,
    /// Operating system image.
    pub operating_system: String,
    /// Free-form hardware/configuration lines.
    pub configs: Vec<String>,
    /// Anything else recognised at provisioning time.
    pub extras: ExtraFields,
    /// Start of the current term.
    pub start_at: DateTime<Utc>,
    /// End of the current term; always after `start_at`.
    pub expire_at: DateTime<Utc>,
    /// Status as of the last recomputation.
    pub status: LeaseStatus,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
    /// Last mutation.
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for LeaseRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaseRecord")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("addresses", &self.addresses)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("product_type", &self.product_type)
            .field("operating_system", &self.operating_system)
            .field("configs", &self.configs)
            .field("extras", &self.extras)
            .field("start_at", &self.start_at)
            .field("expire_at", &self.expire_at)
            .field("status", &self.status)
            .finish()
    }
}

/// A lease about to be written.
#[derive(Clone, PartialEq, Eq)]
pub struct NewLease {
    /// Requesting user.
    pub owner_id: String,
    /// Provisioning text.
    pub raw_content: String,
    /// IPv4 addresses.
    pub addresses: Vec<String>,
    /// Remote access port.
    pub port: String,
    /// Remote access username.
    pub username: String,
    /// Remote access password.
    pub secret: String,
    /// Product line.
    pub product_type: String,
    /// Operating system image.
    pub operating_system: String,
    /// Hardware/configuration lines.
    pub configs: Vec<String>,
    /// Remaining extras.
    pub extras: ExtraFields,
    /// Start of the first term.
    pub start_at: DateTime<Utc>,
    /// End of the first term.
    pub expire_at: DateTime<Utc>,
    /// Initial status.
    pub status: LeaseStatus,
}

impl NewLease {
    /// Check the invariants a stored lease must hold.
    pub fn validate(&self) -> Result<()> {
        if self.owner_id.trim().is_empty() {
            return Err(LeaseError::validation("owner_id", "must not be empty"));
        }
        if self.addresses.is_empty() {
            return Err(LeaseError::validation(
                "addresses",
                "at least one address is required",
            ));
        }
        if let Some(bad) = self.addresses.iter().find(|a| !is_dotted_quad(a)) {
            return Err(LeaseError::validation(
                "addresses",
                format!("'{}' is not a dotted-quad IPv4 address", bad),
            ));
        }
        if self.expire_at <= self.start_at {
            return Err(LeaseError::validation(
                "expire_at",
                "expiry must be after start",
            ));
        }
        Ok(())
    }

    /// Materialize the record the store will hold.
    pub fn into_record(self, id: String, now: DateTime<Utc>) -> LeaseRecord {
        LeaseRecord {
            id,
            owner_id: self.owner_id,
            raw_content: self.raw_content,
            addresses: self.addresses,
            port: self.port,
            username: self.username,
            secret: self.secret,
            product_type: self.product_type,
            operating_system: self.operating_system,
            configs: self.configs,
            extras: self.extras,
            start_at: self.start_at,
            expire_at: self.expire_at,
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}

impl fmt::Debug for NewLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewLease")
            .field("owner_id", &self.owner_id)
            .field("addresses", &self.addresses)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("start_at", &self.start_at)
            .field("expire_at", &self.expire_at)
            .field("status", &self.status)
            .finish()
    }
}

fn is_dotted_quad(address: &str) -> bool {
    address.parse::<std::net::Ipv4Addr>().is_ok()
}

/// One renewal in a lease's append-only history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalRecord {
    /// Unique entry identifier.
    pub id: String,
    /// Lease this renewal extended.
    pub lease_id: String,
    /// When the renewal happened.
    pub renewed_at: DateTime<Utc>,
    /// Expiry before the renewal.
    pub old_expire_at: DateTime<Utc>,
    /// Expiry after the renewal.
    pub new_expire_at: DateTime<Utc>,
}

impl RenewalRecord {
    /// Create a new audit entry with a fresh id.
    pub fn new(
        lease_id: impl Into<String>,
        renewed_at: DateTime<Utc>,
        old_expire_at: DateTime<Utc>,
        new_expire_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            lease_id: lease_id.into(),
            renewed_at,
            old_expire_at,
            new_expire_at,
        }
    }
}
