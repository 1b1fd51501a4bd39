// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Outbound messaging.
//!
//! The sweeps talk to a [`MessagingGateway`] and never to a concrete channel.
//! Recipients are looked up through a [`RecipientDirectory`] so that an owner
//! id does not have to be a channel address.

mod mock;
mod telegram;

pub use mock::{MockGateway, SentMessage};
pub use telegram::TelegramGateway;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Markup a message body is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatMode {
    /// No markup.
    #[default]
    Plain,
    /// HTML subset.
    Html,
    /// Strict Markdown variant.
    MarkdownV2,
}

impl FormatMode {
    /// Telegram `parse_mode` value, if any.
    pub fn parse_mode(&self) -> Option<&'static str> {
        match self {
            FormatMode::Plain => None,
            FormatMode::Html => Some("HTML"),
            FormatMode::MarkdownV2 => Some("MarkdownV2"),
        }
    }
}

/// A message that did not reach its recipient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The channel answered and refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// The channel could not be reached.
    #[error("channel unreachable: {0}")]
    Unreachable(String),
}

/// Sends one message to one recipient.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Deliver `text` to `recipient`.
    async fn send(&self, recipient: &str, text: &str, format: FormatMode)
    -> Result<(), DeliveryError>;
}

/// Gateway that only logs. Used when no channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingGateway;

#[async_trait]
impl MessagingGateway for LoggingGateway {
    async fn send(
        &self,
        recipient: &str,
        text: &str,
        format: FormatMode,
    ) -> Result<(), DeliveryError> {
        info!(
            recipient = %recipient,
            format = ?format,
            text = %text,
            "Notice (no delivery channel configured)"
        );
        Ok(())
    }
}

/// Maps a lease owner to a channel recipient.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Recipient id for `owner_id`, or `None` if the owner cannot be reached.
    async fn resolve(&self, owner_id: &str) -> Option<String>;
}

/// Owner ids are channel chat ids. Anything that is not an integer is
/// unreachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerIdDirectory;

#[async_trait]
impl RecipientDirectory for OwnerIdDirectory {
    async fn resolve(&self, owner_id: &str) -> Option<String> {
        let owner_id = owner_id.trim();
        owner_id
            .parse::<i64>()
            .ok()
            .map(|_| owner_id.to_string())
    }
}

/// Explicit owner → recipient table.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: HashMap<String, String>,
}

impl StaticDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the recipient for `owner_id`.
    pub fn with(mut self, owner_id: impl Into<String>, recipient: impl Into<String>) -> Self {
        self.entries.insert(owner_id.into(), recipient.into());
        self
    }
}

impl FromIterator<(String, String)> for StaticDirectory {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl RecipientDirectory for StaticDirectory {
    async fn resolve(&self, owner_id: &str) -> Option<String> {
        self.entries.get(owner_id).cloned()
    }
}
