// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, NaiveTime, Offset, Utc};

pub use leasekeeper_core::config::ConfigError;

use crate::messaging::{LoggingGateway, MessagingGateway, TelegramGateway};
use crate::schedule::Schedule;

/// Default Telegram Bot API endpoint.
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Leasekeeper engine configuration
#[derive(Clone)]
pub struct EngineConfig {
    /// Time between status sweeps
    pub status_sweep_interval: Duration,
    /// Local time of day the notification sweep runs
    pub notify_at: NaiveTime,
    /// Local zone for the daily trigger and for rendered timestamps
    pub utc_offset: FixedOffset,
    /// Maximum notices in flight at once
    pub notify_concurrency: usize,
    /// Telegram bot token; notices are only logged without one
    pub telegram_bot_token: Option<String>,
    /// Telegram Bot API base URL
    pub telegram_api_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            status_sweep_interval: Duration::from_secs(3600), // 1 hour
            notify_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            utc_offset: Utc.fix(),
            notify_concurrency: 4,
            telegram_bot_token: None,
            telegram_api_url: DEFAULT_TELEGRAM_API_URL.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `LEASEKEEPER_STATUS_SWEEP_INTERVAL_SECS`: seconds between status sweeps (default: 3600)
    /// - `LEASEKEEPER_NOTIFY_AT`: `HH:MM` of the daily notification sweep (default: 09:00)
    /// - `LEASEKEEPER_UTC_OFFSET_MINUTES`: local zone offset in minutes (default: 0)
    /// - `LEASEKEEPER_NOTIFY_CONCURRENCY`: notices in flight at once (default: 4)
    /// - `LEASEKEEPER_TELEGRAM_BOT_TOKEN`: bot token (default: unset, log only)
    /// - `LEASEKEEPER_TELEGRAM_API_URL`: Bot API base URL (default: https://api.telegram.org)
    pub fn from_env() -> Result<Self, ConfigError> {
        let status_sweep_secs: u64 = std::env::var("LEASEKEEPER_STATUS_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::Invalid(
                "LEASEKEEPER_STATUS_SWEEP_INTERVAL_SECS",
                "must be a positive integer",
            ))?;

        let notify_at = NaiveTime::parse_from_str(
            &std::env::var("LEASEKEEPER_NOTIFY_AT").unwrap_or_else(|_| "09:00".to_string()),
            "%H:%M",
        )
        .map_err(|_| ConfigError::Invalid("LEASEKEEPER_NOTIFY_AT", "must be HH:MM"))?;

        let offset_minutes: i32 = std::env::var("LEASEKEEPER_UTC_OFFSET_MINUTES")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("LEASEKEEPER_UTC_OFFSET_MINUTES", "must be an integer")
            })?;
        let utc_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(ConfigError::Invalid(
                "LEASEKEEPER_UTC_OFFSET_MINUTES",
                "must be within -1439..=1439",
            ))?;

        let notify_concurrency: usize = std::env::var("LEASEKEEPER_NOTIFY_CONCURRENCY")
            .unwrap_or_else(|_| "4".to_string())
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Invalid(
                "LEASEKEEPER_NOTIFY_CONCURRENCY",
                "must be a positive integer",
            ))?;

        let telegram_bot_token = std::env::var("LEASEKEEPER_TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        let telegram_api_url = std::env::var("LEASEKEEPER_TELEGRAM_API_URL")
            .unwrap_or_else(|_| DEFAULT_TELEGRAM_API_URL.to_string());

        Ok(Self {
            status_sweep_interval: Duration::from_secs(status_sweep_secs),
            notify_at,
            utc_offset,
            notify_concurrency,
            telegram_bot_token,
            telegram_api_url,
        })
    }

    /// Trigger for the status sweep.
    pub fn status_schedule(&self) -> Schedule {
        Schedule::Every(self.status_sweep_interval)
    }

    /// Trigger for the notification sweep.
    pub fn notification_schedule(&self) -> Schedule {
        Schedule::DailyAt {
            at: self.notify_at,
            offset: self.utc_offset,
        }
    }

    /// Telegram gateway when a token is configured, logging gateway otherwise.
    pub fn messaging_gateway(&self) -> Arc<dyn MessagingGateway> {
        match &self.telegram_bot_token {
            Some(token) => Arc::new(TelegramGateway::new(token, &self.telegram_api_url)),
            None => Arc::new(LoggingGateway),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("status_sweep_interval", &self.status_sweep_interval)
            .field("notify_at", &self.notify_at)
            .field("utc_offset", &self.utc_offset)
            .field("notify_concurrency", &self.notify_concurrency)
            .field(
                "telegram_bot_token",
                &self.telegram_bot_token.as_ref().map(|_| "<redacted>"),
            )
            .field("telegram_api_url", &self.telegram_api_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 6] = [
        "LEASEKEEPER_STATUS_SWEEP_INTERVAL_SECS",
        "LEASEKEEPER_NOTIFY_AT",
        "LEASEKEEPER_UTC_OFFSET_MINUTES",
        "LEASEKEEPER_NOTIFY_CONCURRENCY",
        "LEASEKEEPER_TELEGRAM_BOT_TOKEN",
        "LEASEKEEPER_TELEGRAM_API_URL",
    ];

    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        /// Start from a clean slate for every engine variable.
        fn clean() -> Self {
            let mut guard = Self { vars: Vec::new() };
            for key in VARS {
                guard.remove(key);
            }
            guard
        }

        fn set(&mut self, key: &str, value: &str) {
            self.vars.push((key.to_string(), env::var(key).ok()));
            // SAFETY: Tests are serialized via ENV_MUTEX
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            self.vars.push((key.to_string(), env::var(key).ok()));
            // SAFETY: Tests are serialized via ENV_MUTEX
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::clean();

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.status_sweep_interval, Duration::from_secs(3600));
        assert_eq!(config.notify_at, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(config.utc_offset.local_minus_utc(), 0);
        assert_eq!(config.notify_concurrency, 4);
        assert!(config.telegram_bot_token.is_none());
        assert_eq!(config.telegram_api_url, DEFAULT_TELEGRAM_API_URL);
    }

    #[test]
    fn test_custom_values() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();
        guard.set("LEASEKEEPER_STATUS_SWEEP_INTERVAL_SECS", "600");
        guard.set("LEASEKEEPER_NOTIFY_AT", "08:30");
        guard.set("LEASEKEEPER_UTC_OFFSET_MINUTES", "480");
        guard.set("LEASEKEEPER_NOTIFY_CONCURRENCY", "16");
        guard.set("LEASEKEEPER_TELEGRAM_BOT_TOKEN", "123:abc");

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.status_sweep_interval, Duration::from_secs(600));
        assert_eq!(config.notify_at, NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(config.utc_offset.local_minus_utc(), 8 * 3600);
        assert_eq!(config.notify_concurrency, 16);
        assert_eq!(config.telegram_bot_token.as_deref(), Some("123:abc"));
        assert!(!format!("{:?}", config).contains("123:abc"));
        assert!(matches!(
            config.notification_schedule(),
            Schedule::DailyAt { .. }
        ));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();
        guard.set("LEASEKEEPER_NOTIFY_CONCURRENCY", "0");

        let err = EngineConfig::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid("LEASEKEEPER_NOTIFY_CONCURRENCY", _)
        ));
    }

    #[test]
    fn test_rejects_bad_notify_time() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();
        guard.set("LEASEKEEPER_NOTIFY_AT", "9am");

        let err = EngineConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("LEASEKEEPER_NOTIFY_AT", _)));
    }

    #[test]
    fn test_rejects_out_of_range_offset() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();
        guard.set("LEASEKEEPER_UTC_OFFSET_MINUTES", "1440");

        let err = EngineConfig::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid("LEASEKEEPER_UTC_OFFSET_MINUTES", _)
        ));
    }

    #[test]
    fn test_blank_token_means_no_token() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();
        guard.set("LEASEKEEPER_TELEGRAM_BOT_TOKEN", "  ");

        assert!(EngineConfig::from_env().unwrap().telegram_bot_token.is_none());
    }
}
