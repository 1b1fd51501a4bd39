// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for leasekeeper-core.
//!
//! Stateful lease operations fail fast with one of these variants and leave
//! the store untouched. Pure functions (expiry, status, parser) never fail.

use std::fmt;

/// Result type using LeaseError
pub type Result<T> = std::result::Result<T, LeaseError>;

/// Errors raised by lease operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LeaseError {
    /// Lease was not found in the store.
    LeaseNotFound {
        /// The lease ID that was not found.
        lease_id: String,
    },

    /// The privileged secret did not match.
    Unauthorized {
        /// The operation that was refused.
        operation: &'static str,
    },

    /// Input validation failed.
    ValidationError {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },

    /// Database operation failed.
    DatabaseError {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl LeaseError {
    /// Build a validation error for `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::LeaseNotFound { .. } => "LEASE_NOT_FOUND",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::ValidationError { .. } => "VALIDATION_ERROR",
            Self::DatabaseError { .. } => "DATABASE_ERROR",
        }
    }
}

impl fmt::Display for LeaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeaseNotFound { lease_id } => {
                write!(f, "Lease '{}' not found", lease_id)
            }
            Self::Unauthorized { operation } => {
                write!(f, "Administrator secret rejected for '{}'", operation)
            }
            Self::ValidationError { field, message } => {
                write!(f, "Validation error for '{}': {}", field, message)
            }
            Self::DatabaseError { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
        }
    }
}

impl std::error::Error for LeaseError {}

impl From<sqlx::Error> for LeaseError {
    fn from(err: sqlx::Error) -> Self {
        LeaseError::DatabaseError {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for LeaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        LeaseError::DatabaseError {
            operation: "migrate".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for LeaseError {
    fn from(err: serde_json::Error) -> Self {
        LeaseError::DatabaseError {
            operation: "json".to_string(),
            details: err.to_string(),
        }
    }
}
