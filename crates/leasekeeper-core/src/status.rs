// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lease lifecycle status and its classification.
//!
//! ```text
//!   remaining days  >7        6..=7       1..=5       <=0
//!                 NORMAL ──► PENDING ──► EXPIRING ──► EXPIRED
//! ```
//!
//! Remaining days are whole days, truncated toward zero. Thresholds are
//! inclusive on the upper side: exactly 5 days is `Expiring`, exactly 7 is
//! `Pending`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LeaseError;

/// Days at or below which a lease is `Expiring`.
pub const EXPIRING_THRESHOLD_DAYS: i64 = 5;
/// Days at or below which a lease is `Pending`.
pub const PENDING_THRESHOLD_DAYS: i64 = 7;

/// Lease lifecycle status, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseStatus {
    /// More than a week left.
    Normal,
    /// Due for renewal within a week.
    Pending,
    /// Five days or less left.
    Expiring,
    /// Past its expiry.
    Expired,
}

impl LeaseStatus {
    /// All statuses, least severe first.
    pub const ALL: [LeaseStatus; 4] = [
        LeaseStatus::Normal,
        LeaseStatus::Pending,
        LeaseStatus::Expiring,
        LeaseStatus::Expired,
    ];

    /// Statuses the notification sweep reports on.
    pub const NOTIFIABLE: [LeaseStatus; 3] = [
        LeaseStatus::Pending,
        LeaseStatus::Expiring,
        LeaseStatus::Expired,
    ];

    /// The persisted token.
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseStatus::Normal => "normal",
            LeaseStatus::Pending => "pending",
            LeaseStatus::Expiring => "expiring",
            LeaseStatus::Expired => "expired",
        }
    }

    /// Whether the owner should hear about this lease.
    pub fn needs_notice(&self) -> bool {
        !matches!(self, LeaseStatus::Normal)
    }
}

impl fmt::Display for LeaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaseStatus {
    type Err = LeaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(LeaseStatus::Normal),
            "pending" => Ok(LeaseStatus::Pending),
            "expiring" => Ok(LeaseStatus::Expiring),
            "expired" => Ok(LeaseStatus::Expired),
            other => Err(LeaseError::validation(
                "status",
                format!("unknown lease status '{}'", other),
            )),
        }
    }
}

/// Whole days between `now` and `expire`, truncated toward zero.
pub fn remaining_days(expire: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expire - now).num_days()
}

/// Classify a lease expiring at `expire` as seen at `now`.
pub fn classify(expire: DateTime<Utc>, now: DateTime<Utc>) -> LeaseStatus {
    let days = remaining_days(expire, now);
    if days <= 0 {
        LeaseStatus::Expired
    } else if days <= EXPIRING_THRESHOLD_DAYS {
        LeaseStatus::Expiring
    } else if days <= PENDING_THRESHOLD_DAYS {
        LeaseStatus::Pending
    } else {
        LeaseStatus::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_boundaries() {
        let now = now();
        assert_eq!(classify(now, now), LeaseStatus::Expired);
        assert_eq!(classify(now + Duration::days(1), now), LeaseStatus::Expiring);
        assert_eq!(classify(now + Duration::days(5), now), LeaseStatus::Expiring);
        assert_eq!(classify(now + Duration::days(6), now), LeaseStatus::Pending);
        assert_eq!(classify(now + Duration::days(7), now), LeaseStatus::Pending);
        assert_eq!(classify(now + Duration::days(8), now), LeaseStatus::Normal);
    }

    #[test]
    fn test_partial_days_truncate() {
        let now = now();
        // 23 hours left is zero whole days
        assert_eq!(classify(now + Duration::hours(23), now), LeaseStatus::Expired);
        // 5 days 23 hours is still five whole days
        assert_eq!(
            classify(now + Duration::days(5) + Duration::hours(23), now),
            LeaseStatus::Expiring
        );
        // 7 days 12 hours is still seven whole days
        assert_eq!(
            classify(now + Duration::days(7) + Duration::hours(12), now),
            LeaseStatus::Pending
        );
    }

    #[test]
    fn test_past_expiry_is_expired() {
        let now = now();
        assert_eq!(classify(now - Duration::hours(1), now), LeaseStatus::Expired);
        assert_eq!(classify(now - Duration::days(30), now), LeaseStatus::Expired);
    }

    #[test]
    fn test_remaining_days_truncates_toward_zero() {
        let now = now();
        assert_eq!(remaining_days(now + Duration::hours(47), now), 1);
        assert_eq!(remaining_days(now - Duration::hours(47), now), -1);
    }

    #[test]
    fn test_severity_order() {
        assert!(LeaseStatus::Normal < LeaseStatus::Pending);
        assert!(LeaseStatus::Pending < LeaseStatus::Expiring);
        assert!(LeaseStatus::Expiring < LeaseStatus::Expired);
    }

    #[test]
    fn test_token_roundtrip() {
        for status in LeaseStatus::ALL {
            assert_eq!(status.as_str().parse::<LeaseStatus>().unwrap(), status);
        }
        assert!("overdue".parse::<LeaseStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&LeaseStatus::Expiring).unwrap(),
            "\"expiring\""
        );
    }

    #[test]
    fn test_needs_notice() {
        assert!(!LeaseStatus::Normal.needs_notice());
        for status in LeaseStatus::NOTIFIABLE {
            assert!(status.needs_notice());
        }
    }
}
