// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Result of asking a sweep to run.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::schedule::Schedule;

/// Outcome of one sweep request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "report", rename_all = "lowercase")]
pub enum SweepOutcome<T> {
    /// The sweep ran to the end.
    Completed(T),
    /// Another run of the same sweep was still in progress.
    Skipped,
}

impl<T> SweepOutcome<T> {
    /// The report, if the sweep ran.
    pub fn report(self) -> Option<T> {
        match self {
            SweepOutcome::Completed(report) => Some(report),
            SweepOutcome::Skipped => None,
        }
    }

    /// Whether the request was dropped because a run was in progress.
    pub fn is_skipped(&self) -> bool {
        matches!(self, SweepOutcome::Skipped)
    }
}

/// Walks a [`Schedule`] forward without firing the same slot twice, even if
/// the clock reads slightly behind the slot after waking.
#[derive(Debug, Clone)]
pub(crate) struct Ticker {
    schedule: Schedule,
    anchor: DateTime<Utc>,
}

impl Ticker {
    pub(crate) fn new(schedule: Schedule, now: DateTime<Utc>) -> Self {
        Self {
            schedule,
            anchor: now,
        }
    }

    /// Next fire instant and the wait until it, as seen at `now`.
    pub(crate) fn next(&self, now: DateTime<Utc>) -> (DateTime<Utc>, std::time::Duration) {
        let fire_at = self.schedule.next_after(self.anchor.max(now));
        let wait = (fire_at - now).to_std().unwrap_or_default();
        (fire_at, wait)
    }

    /// Record that the slot at `fire_at` has fired.
    pub(crate) fn fired(&mut self, fire_at: DateTime<Utc>) {
        self.anchor = fire_at;
    }
}
