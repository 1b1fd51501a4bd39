// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Expiry calculation: one calendar month from a start instant.
//!
//! The day-of-month is preserved. When the following month is too short
//! (Jan 30 or Jan 31 → February, Mar 31 → April), the expiry is clamped to
//! the last day of that month. Time of day is kept.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};

/// Compute the expiry instant for a lease starting at `start`.
pub fn compute_expiry(start: DateTime<Utc>) -> DateTime<Utc> {
    let date = start.date_naive();
    next_month_same_day(date)
        .and_time(start.time())
        .and_utc()
}

/// First of the month, plus 32 days, lands in the following month whatever
/// the current month's length; then restore the original day, clamped.
fn next_month_same_day(date: NaiveDate) -> NaiveDate {
    let first = date.with_day(1).unwrap_or(date);
    let in_next_month = first + Days::new(32);

    (1..=date.day())
        .rev()
        .find_map(|day| in_next_month.with_day(day))
        .unwrap_or(in_next_month)
}
