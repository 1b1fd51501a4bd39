// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::fmt;

use crate::auth::AdminSecret;

/// Leasekeeper core configuration
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL
    pub database_url: String,
    /// Administrator secret gating renewal and deletion; only the operator
    /// tool needs it
    pub admin_secret: Option<AdminSecret>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `LEASEKEEPER_DATABASE_URL`: `sqlite:` or `postgres://` connection string
    ///
    /// Optional:
    /// - `LEASEKEEPER_ADMIN_SECRET`: administrator secret (must not be empty when set)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("LEASEKEEPER_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("LEASEKEEPER_DATABASE_URL"))?;
        Self::for_database(database_url)
    }

    /// Like [`Config::from_env`], but with the database URL supplied by the
    /// caller.
    pub fn for_database(database_url: impl Into<String>) -> Result<Self, ConfigError> {
        let database_url = database_url.into();
        if !is_supported_url(&database_url) {
            return Err(ConfigError::Invalid(
                "LEASEKEEPER_DATABASE_URL",
                "must start with sqlite:, postgres:// or postgresql://",
            ));
        }

        let admin_secret = match std::env::var("LEASEKEEPER_ADMIN_SECRET") {
            Ok(secret) if secret.is_empty() => {
                return Err(ConfigError::Invalid(
                    "LEASEKEEPER_ADMIN_SECRET",
                    "must not be empty",
                ));
            }
            Ok(secret) => Some(AdminSecret::new(secret)),
            Err(_) => None,
        };

        Ok(Self {
            database_url,
            admin_secret,
        })
    }

    /// The administrator secret, for operations that are gated on it.
    pub fn require_admin_secret(&self) -> Result<&AdminSecret, ConfigError> {
        self.admin_secret
            .as_ref()
            .ok_or(ConfigError::Missing("LEASEKEEPER_ADMIN_SECRET"))
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url)
            .field("admin_secret", &self.admin_secret)
            .finish()
    }
}

pub(crate) fn is_supported_url(url: &str) -> bool {
    url.starts_with("sqlite:") || url.starts_with("postgres://") || url.starts_with("postgresql://")
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
