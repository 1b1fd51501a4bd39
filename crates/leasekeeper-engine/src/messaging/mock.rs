// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory gateway for tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{DeliveryError, FormatMode, MessagingGateway};

/// A message accepted by [`MockGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Recipient id.
    pub recipient: String,
    /// Body.
    pub text: String,
    /// Markup.
    pub format: FormatMode,
}

/// Gateway that records what it is asked to send.
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    failing: Arc<HashSet<String>>,
    delay: Option<Duration>,
}

impl MockGateway {
    /// Gateway that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway that rejects messages for the given recipients.
    pub fn failing_for<I, S>(recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failing: Arc::new(recipients.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Hold every send for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Messages accepted so far, in arrival order.
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MessagingGateway for MockGateway {
    async fn send(
        &self,
        recipient: &str,
        text: &str,
        format: FormatMode,
    ) -> Result<(), DeliveryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.contains(recipient) {
            return Err(DeliveryError::Rejected(format!(
                "Bad Request: chat {} not found",
                recipient
            )));
        }

        self.sent.lock().await.push(SentMessage {
            recipient: recipient.to_string(),
            text: text.to_string(),
            format,
        });
        Ok(())
    }
}
