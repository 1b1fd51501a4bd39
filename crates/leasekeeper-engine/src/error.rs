// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for leasekeeper-engine.

use thiserror::Error;

/// Engine errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A lease operation failed.
    #[error("Lease error: {0}")]
    Lease(#[from] leasekeeper_core::LeaseError),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type using the engine Error.
pub type Result<T> = std::result::Result<T, Error>;
