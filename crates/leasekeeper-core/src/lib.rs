// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Leasekeeper Core - lease model and lifecycle rules
//!
//! This crate holds everything about a leased server that does not depend on
//! a timer or a messaging channel: how long a term lasts, what status a lease
//! is in, how operator text becomes a record, and how records are stored,
//! renewed and deleted.
//!
//! # Architecture
//!
//! ```text
//!   provisioning text ──► parser ──► provisioning ──► LeaseStore ◄── renewal
//!                                        │                ▲            │
//!                                        ▼                │            ▼
//!                                  expiry + status ───────┘     auth (PrivilegeCheck)
//!                                                         │
//!                                                         ▼
//!                                          leasekeeper-engine sweeps
//! ```
//!
//! # Lifecycle
//!
//! | Remaining whole days | Status |
//! |----------------------|--------|
//! | `> 7` | `normal` |
//! | `6..=7` | `pending` |
//! | `1..=5` | `expiring` |
//! | `<= 0` | `expired` |
//!
//! A term is one calendar month. Renewing early extends from the current
//! expiry; renewing an expired lease extends from now.
//!
//! # Modules
//!
//! - [`expiry`], [`status`], [`parser`]: pure functions, never fail
//! - [`persistence`]: the [`LeaseStore`] trait with SQLite and PostgreSQL backends
//! - [`renewal`], [`provisioning`]: stateful operations over a store
//! - [`auth`], [`clock`], [`config`]: injected collaborators

#![deny(missing_docs)]

/// Privileged-secret check.
pub mod auth;

/// Injectable time source.
pub mod clock;

/// Configuration loaded from environment variables.
pub mod config;

/// Error types with stable error codes.
pub mod error;

/// One-month term arithmetic.
pub mod expiry;

/// Free-text provisioning parser.
pub mod parser;

/// Lease store trait and database backends.
pub mod persistence;

/// Creating leases from structured or free-text input.
pub mod provisioning;

/// Lease and renewal records.
pub mod records;

/// Renewal and deletion.
pub mod renewal;

/// Lifecycle status classification.
pub mod status;

/// Fleet summary.
pub mod summary;

pub use auth::{AdminSecret, PrivilegeCheck};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{LeaseError, Result};
pub use expiry::compute_expiry;
pub use parser::{ExtraFields, ParsedLease, StructuredFields, parse_lease_text};
pub use persistence::{
    LeaseStore, PostgresLeaseStore, ScannedLease, SqliteLeaseStore, UndecodableLease, connect_store,
};
pub use provisioning::{ProvisionRequest, Provisioner};
pub use records::{LeaseRecord, NewLease, RenewalRecord};
pub use renewal::{RenewalOutcome, RenewalService};
pub use status::{LeaseStatus, classify, remaining_days};
pub use summary::{LeaseSummary, summarize};
