// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sweep triggers.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta, TimeZone, Utc};

/// When a sweep fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Fixed period, measured from the previous fire.
    Every(Duration),
    /// Once a day at a local wall-clock time.
    DailyAt {
        /// Local time of day.
        at: NaiveTime,
        /// Local zone.
        offset: FixedOffset,
    },
}

impl Schedule {
    /// Next fire instant strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Schedule::Every(period) => {
                let period = TimeDelta::from_std(period)
                    .unwrap_or(TimeDelta::MAX)
                    .max(TimeDelta::milliseconds(1));
                now.checked_add_signed(period).unwrap_or(DateTime::<Utc>::MAX_UTC)
            }
            Schedule::DailyAt { at, offset } => {
                let local_date = now.with_timezone(&offset).date_naive();
                let today = local_date.and_time(at) - TimeDelta::seconds(offset.local_minus_utc().into());
                let candidate = Utc.from_utc_datetime(&today);
                if candidate > now {
                    candidate
                } else {
                    candidate + TimeDelta::days(1)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_every_adds_period() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let schedule = Schedule::Every(Duration::from_secs(3600));
        assert_eq!(
            schedule.next_after(now),
            Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_every_zero_still_moves_forward() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        assert!(Schedule::Every(Duration::ZERO).next_after(now) > now);
    }

    #[test]
    fn test_daily_later_today() {
        let schedule = Schedule::DailyAt {
            at: at(9, 0),
            offset: FixedOffset::east_opt(0).unwrap(),
        };
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 59, 0).unwrap();
        assert_eq!(
            schedule.next_after(now),
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_daily_exactly_at_fire_moves_to_tomorrow() {
        let schedule = Schedule::DailyAt {
            at: at(9, 0),
            offset: FixedOffset::east_opt(0).unwrap(),
        };
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        assert_eq!(
            schedule.next_after(now),
            Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_daily_respects_offset() {
        // 09:00 at UTC+8 is 01:00 UTC
        let schedule = Schedule::DailyAt {
            at: at(9, 0),
            offset: FixedOffset::east_opt(8 * 3600).unwrap(),
        };

        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 30, 0).unwrap();
        assert_eq!(
            schedule.next_after(now),
            Utc.with_ymd_and_hms(2025, 3, 1, 1, 0, 0).unwrap()
        );

        // 20:00 UTC is already 04:00 on Mar 2 locally
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap();
        assert_eq!(
            schedule.next_after(now),
            Utc.with_ymd_and_hms(2025, 3, 2, 1, 0, 0).unwrap()
        );
    }
}
