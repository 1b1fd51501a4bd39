// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Owner-facing notice text.
//!
//! The template is picked by the lease's *stored* status, which is what the
//! notification sweep selects on. Remaining days are computed against `now`
//! at composition time.

use chrono::{DateTime, FixedOffset, Utc};
use leasekeeper_core::{LeaseRecord, LeaseStatus, remaining_days};

use crate::messaging::FormatMode;

/// Layout of the expiry timestamp inside a notice.
pub const EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A composed message, ready for a gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Body.
    pub text: String,
    /// Markup the body is written in.
    pub format: FormatMode,
}

/// Compose the notice for `lease` as seen at `now`, rendering times in
/// `offset`. Returns `None` for leases in `Normal` status.
pub fn compose_notice(lease: &LeaseRecord, now: DateTime<Utc>, offset: FixedOffset) -> Option<Notice> {
    let addresses = escape_html(&lease.addresses.join(", "));
    let expire = lease.expire_at.with_timezone(&offset).format(EXPIRY_FORMAT);
    let days = remaining_days(lease.expire_at, now);

    let text = match lease.status {
        LeaseStatus::Normal => return None,
        LeaseStatus::Expired => format!(
            "⚠️ 服务器已过期\n\nIP: {}\n过期时间: {}\n请尽快续期！",
            addresses, expire
        ),
        LeaseStatus::Expiring => format!(
            "⚠️ 服务器即将到期\n\nIP: {}\n剩余天数: {}天\n到期时间: {}\n请及时续期！",
            addresses, days, expire
        ),
        LeaseStatus::Pending => format!(
            "📅 服务器到期提醒\n\nIP: {}\n剩余天数: {}天\n到期时间: {}\n请注意续期时间。",
            addresses, days, expire
        ),
    };

    Some(Notice {
        text,
        format: FormatMode::Html,
    })
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
