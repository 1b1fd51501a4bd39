// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Leasekeeper Engine - lifecycle scheduler and notifications
//!
//! Drives leases stored through [`leasekeeper_core`] forward in time. Two
//! sweeps run independently of each other:
//!
//! - **Status sweep** (hourly by default): reclassifies every lease and writes
//!   back the ones whose status changed.
//! - **Notification sweep** (daily at 09:00 by default): sends one notice per
//!   lease in `pending`, `expiring` or `expired` status to its owner.
//!
//! ```text
//!                   ┌──────────────── LifecycleRuntime ────────────────┐
//!                   │                                                  │
//!   Schedule ──►  StatusSweeper ──► LeaseStore ◄── NotificationSweeper ◄── Schedule
//!                   │                                   │              │
//!                   │                      RecipientDirectory          │
//!                   │                                   │              │
//!                   └───────────────────────────── MessagingGateway ───┘
//!                                                       │
//!                                          Telegram / logging / mock
//! ```
//!
//! A sweep that is triggered while its previous run is still in progress is
//! skipped, not queued.

#![deny(missing_docs)]

/// Environment configuration for the engine.
pub mod config;

/// Error types for the engine.
pub mod error;

/// Outbound messaging gateways and recipient lookup.
pub mod messaging;

/// Notice composition.
pub mod notice;

/// Notification sweep worker.
pub mod notification_sweep;

/// Embeddable runtime running both sweeps.
pub mod runtime;

/// Sweep triggers.
pub mod schedule;

/// Status sweep worker.
pub mod status_sweep;

/// Sweep outcome shared by both workers.
pub mod sweep;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use messaging::{
    DeliveryError, FormatMode, LoggingGateway, MessagingGateway, MockGateway, OwnerIdDirectory,
    RecipientDirectory, StaticDirectory, TelegramGateway,
};
pub use notice::{Notice, compose_notice};
pub use notification_sweep::{NotificationReport, NotificationSweepConfig, NotificationSweeper};
pub use runtime::LifecycleRuntime;
pub use schedule::Schedule;
pub use status_sweep::{StatusSweepConfig, StatusSweepReport, StatusSweeper};
pub use sweep::SweepOutcome;
