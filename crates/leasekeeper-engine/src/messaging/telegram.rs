// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Telegram Bot API gateway.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{DeliveryError, FormatMode, MessagingGateway};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const REDACTED: &str = "<redacted>";

/// Body of every Bot API reply.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Delivers through `sendMessage` of the Telegram Bot API.
///
/// The token is part of the request path, so it is scrubbed from every error
/// this gateway returns.
#[derive(Clone)]
pub struct TelegramGateway {
    agent: ureq::Agent,
    token: String,
    api_url: String,
}

impl fmt::Debug for TelegramGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramGateway")
            .field("token", &REDACTED)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl TelegramGateway {
    /// Create a gateway for bot `token` against `api_url`
    /// (normally `https://api.telegram.org`).
    pub fn new(token: impl Into<String>, api_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            agent,
            token: token.into(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_url, self.token)
    }

    fn scrub(&self, message: String) -> String {
        if self.token.is_empty() {
            message
        } else {
            message.replace(&self.token, REDACTED)
        }
    }

    fn send_blocking(&self, body: Value) -> Result<(), DeliveryError> {
        match self.agent.post(&self.endpoint()).send_json(body) {
            Ok(response) => {
                let reply: ApiResponse = response.into_json().map_err(|e| {
                    DeliveryError::Unreachable(self.scrub(format!("unreadable reply: {}", e)))
                })?;
                if reply.ok {
                    Ok(())
                } else {
                    Err(DeliveryError::Rejected(
                        reply
                            .description
                            .unwrap_or_else(|| "request refused".to_string()),
                    ))
                }
            }
            Err(ureq::Error::Status(code, response)) => {
                let description = response
                    .into_json::<ApiResponse>()
                    .ok()
                    .and_then(|reply| reply.description)
                    .unwrap_or_else(|| format!("HTTP {}", code));
                Err(DeliveryError::Rejected(self.scrub(description)))
            }
            Err(ureq::Error::Transport(transport)) => {
                Err(DeliveryError::Unreachable(self.scrub(transport.to_string())))
            }
        }
    }
}

fn chat_id(recipient: &str) -> Value {
    match recipient.parse::<i64>() {
        Ok(id) => json!(id),
        Err(_) => json!(recipient),
    }
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    async fn send(
        &self,
        recipient: &str,
        text: &str,
        format: FormatMode,
    ) -> Result<(), DeliveryError> {
        let mut body = json!({
            "chat_id": chat_id(recipient),
            "text": text,
        });
        if let Some(mode) = format.parse_mode() {
            body["parse_mode"] = json!(mode);
        }

        debug!(recipient = %recipient, format = ?format, "Sending Telegram message");

        let gateway = self.clone();
        tokio::task::spawn_blocking(move || gateway.send_blocking(body))
            .await
            .map_err(|e| DeliveryError::Unreachable(format!("delivery task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "123456:SECRET-TOKEN";

    fn send_message_path() -> String {
        format!("/bot{}/sendMessage", TOKEN)
    }

    #[tokio::test]
    async fn test_send_ok() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(send_message_path()))
            .and(body_json(json!({
                "chat_id": 42,
                "text": "<b>hi</b>",
                "parse_mode": "HTML",
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let gateway = TelegramGateway::new(TOKEN, mock_server.uri());
        gateway
            .send("42", "<b>hi</b>", FormatMode::Html)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_plain_text_has_no_parse_mode() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(send_message_path()))
            .and(body_json(json!({"chat_id": "@ops", "text": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let gateway = TelegramGateway::new(TOKEN, format!("{}/", mock_server.uri()));
        gateway.send("@ops", "hello", FormatMode::Plain).await.unwrap();
    }

    #[tokio::test]
    async fn test_ok_false_is_rejected_with_description() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(send_message_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": false,
                "description": "Forbidden: bot was blocked by the user",
            })))
            .mount(&mock_server)
            .await;

        let gateway = TelegramGateway::new(TOKEN, mock_server.uri());
        let err = gateway.send("42", "x", FormatMode::Plain).await.unwrap_err();
        assert_eq!(
            err,
            DeliveryError::Rejected("Forbidden: bot was blocked by the user".to_string())
        );
    }

    #[tokio::test]
    async fn test_http_error_status_is_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(send_message_path()))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found",
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let gateway = TelegramGateway::new(TOKEN, mock_server.uri());
        let err = gateway.send("42", "x", FormatMode::Plain).await.unwrap_err();
        assert_eq!(
            err,
            DeliveryError::Rejected("Bad Request: chat not found".to_string())
        );
    }

    #[tokio::test]
    async fn test_unreachable_never_leaks_token() {
        // Bind then drop to get a port nobody listens on
        let addr = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let gateway = TelegramGateway::new(TOKEN, format!("http://{}", addr));

        let err = gateway.send("42", "x", FormatMode::Plain).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Unreachable(_)));
        assert!(!err.to_string().contains(TOKEN));
        assert!(!format!("{:?}", gateway).contains(TOKEN));
    }
}
