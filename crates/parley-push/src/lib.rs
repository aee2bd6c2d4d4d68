// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push notification channel adapter (OneSignal REST API).
//!
//! The recipient of an [`OutboundMessage`] is the device's player id.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use parley_config::model::PushConfig;
use parley_core::traits::{ChannelAdapter, PluginAdapter};
use parley_core::types::{DeliveryChannel, HealthStatus, MessageId, OutboundMessage};
use parley_core::ParleyError;

#[derive(Debug, Serialize)]
struct Notification<'a> {
    app_id: &'a str,
    headings: HashMap<&'static str, &'a str>,
    contents: HashMap<&'static str, &'a str>,
    include_player_ids: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct NotificationResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

pub struct PushChannel {
    client: reqwest::Client,
    base_url: String,
    app_id: String,
    default_heading: String,
}

impl PushChannel {
    /// `None` unless both the app id and the REST key are configured.
    pub fn from_config(
        config: &PushConfig,
        default_heading: &str,
        timeout: Duration,
    ) -> Result<Option<Self>, ParleyError> {
        let (Some(app_id), Some(api_key)) = (&config.app_id, &config.api_key) else {
            debug!("push app id or key not configured, channel disabled");
            return Ok(None);
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {api_key}"))
                .map_err(|e| ParleyError::Config(format!("invalid push API key header value: {e}")))?,
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ParleyError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        info!(app_id = %app_id, "push notifications configured");
        Ok(Some(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_id: app_id.clone(),
            default_heading: default_heading.to_string(),
        }))
    }
}

#[async_trait]
impl PluginAdapter for PushChannel {
    fn name(&self) -> &str {
        "push-onesignal"
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        let response = self
            .client
            .get(format!("{}/api/v1/apps/{}", self.base_url, self.app_id))
            .send()
            .await
            .map_err(|e| ParleyError::Channel {
                message: format!("push health request failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        let status = response.status();
        if status.is_success() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy(format!("push provider returned {status}")))
        }
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for PushChannel {
    fn channel(&self) -> DeliveryChannel {
        DeliveryChannel::Push
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, ParleyError> {
        let player_id = msg.recipient.trim();
        if player_id.is_empty() {
            return Err(ParleyError::InvalidInput(
                "push recipient requires a player id".to_string(),
            ));
        }
        let heading = msg.subject.as_deref().unwrap_or(&self.default_heading);
        let notification = Notification {
            app_id: &self.app_id,
            headings: HashMap::from([("en", heading)]),
            contents: HashMap::from([("en", msg.body.as_str())]),
            include_player_ids: [player_id],
        };

        let response = self
            .client
            .post(format!("{}/api/v1/notifications", self.base_url))
            .json(&notification)
            .send()
            .await
            .map_err(|e| ParleyError::Channel {
                message: format!("push request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ParleyError::channel(format!(
                "push provider returned {status}: {body}"
            )));
        }
        let parsed: NotificationResponse =
            serde_json::from_str(&body).map_err(|e| ParleyError::Channel {
                message: format!("failed to parse push response: {e}"),
                source: Some(Box::new(e)),
            })?;

        match (parsed.id, parsed.errors) {
            (_, Some(errors)) if !errors.is_null() => Err(ParleyError::channel(format!(
                "push rejected: {errors}"
            ))),
            (Some(id), _) if !id.is_empty() => {
                debug!(notification_id = %id, "push sent");
                Ok(MessageId(id))
            }
            _ => Err(ParleyError::channel("push rejected: no notification id")),
        }
    }
}
