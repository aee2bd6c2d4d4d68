// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for a Whapi-style WhatsApp gateway.

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use parley_core::ParleyError;

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    to: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    sent: bool,
    #[serde(default)]
    message: Option<SentMessage>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: Option<SessionStatus>,
}

#[derive(Debug, Deserialize)]
struct SessionStatus {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    text: Option<String>,
}

/// Session state reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Authenticated,
    /// Anything else (`INIT`, `QR`, ...), with the reported text.
    Other(String),
}

#[derive(Debug, Clone)]
pub struct WhapiClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl WhapiClient {
    pub fn new(base_url: &str, token: String, timeout: Duration) -> Result<Self, ParleyError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ParleyError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Send a text message. `token` overrides the client's own token.
    /// Returns the gateway message id.
    pub async fn send_text(
        &self,
        to: &str,
        body: &str,
        token: Option<&str>,
    ) -> Result<String, ParleyError> {
        let response = self
            .client
            .post(format!("{}/messages/text", self.base_url))
            .bearer_auth(token.unwrap_or(&self.token))
            .json(&TextMessage { to, body })
            .send()
            .await
            .map_err(|e| ParleyError::Channel {
                message: format!("whatsapp request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, "whatsapp send response");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ParleyError::channel(format!(
                "whatsapp gateway returned {status}: {body}"
            )));
        }

        let parsed: SendResponse = response.json().await.map_err(|e| ParleyError::Channel {
            message: format!("failed to parse whatsapp response: {e}"),
            source: Some(Box::new(e)),
        })?;
        match parsed.message {
            Some(message) if parsed.sent => Ok(message.id),
            _ => Err(ParleyError::channel(format!(
                "whatsapp message not sent: {}",
                parsed
                    .error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no message id returned".to_string())
            ))),
        }
    }

    pub async fn session_state(&self) -> Result<SessionState, ParleyError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ParleyError::Channel {
                message: format!("whatsapp health request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ParleyError::channel(format!(
                "whatsapp health returned {status}: {body}"
            )));
        }

        let parsed: HealthResponse = response.json().await.map_err(|e| ParleyError::Channel {
            message: format!("failed to parse whatsapp health: {e}"),
            source: Some(Box::new(e)),
        })?;
        let session = parsed.status.unwrap_or(SessionStatus {
            code: None,
            text: None,
        });
        if session.text.as_deref() == Some("AUTH") || session.code == Some(4) {
            Ok(SessionState::Authenticated)
        } else {
            Ok(SessionState::Other(
                session.text.unwrap_or_else(|| "UNKNOWN".to_string()),
            ))
        }
    }
}
