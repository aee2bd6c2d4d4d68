// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp channel adapter for the Parley conversation engine.
//!
//! Talks to a Whapi-style REST gateway: `POST /messages/text` with a bearer
//! token and `GET /health` for the session state. Numbers are addressed in
//! bare transport form (`5215512345678`).

pub mod client;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use parley_config::model::{IdentityConfig, WhatsAppConfig};
use parley_core::identity::{PhoneFormat, TransportStyle};
use parley_core::traits::{ChannelAdapter, PluginAdapter};
use parley_core::types::{DeliveryChannel, HealthStatus, MessageId, OutboundMessage};
use parley_core::ParleyError;

pub use client::{SessionState, WhapiClient};

/// One WhatsApp account.
pub struct WhatsAppChannel {
    name: String,
    client: WhapiClient,
    phone: PhoneFormat,
}

impl WhatsAppChannel {
    pub fn new(name: impl Into<String>, client: WhapiClient, phone: PhoneFormat) -> Self {
        Self {
            name: name.into(),
            client,
            phone,
        }
    }

    /// Build the primary account followed by every backup account, each
    /// paired with its credential label. Empty when no token is configured.
    pub fn from_config(
        config: &WhatsAppConfig,
        identity: &IdentityConfig,
        timeout: Duration,
    ) -> Result<Vec<(String, WhatsAppChannel)>, ParleyError> {
        let Some(primary) = &config.token else {
            debug!("whatsapp token not configured, channel disabled");
            return Ok(Vec::new());
        };
        let phone = PhoneFormat::new(&identity.country_code, &identity.mobile_indicator);

        let tokens = std::iter::once(("primary".to_string(), primary))
            .chain(
                config
                    .backup_tokens
                    .iter()
                    .enumerate()
                    .map(|(i, t)| (format!("backup-{}", i + 1), t)),
            );
        let mut accounts = Vec::new();
        for (label, token) in tokens {
            let client = WhapiClient::new(&config.base_url, token.clone(), timeout)?;
            let channel = WhatsAppChannel::new(format!("whatsapp-{label}"), client, phone.clone());
            accounts.push((label, channel));
        }
        info!(accounts = accounts.len(), "whatsapp accounts configured");
        Ok(accounts)
    }
}

#[async_trait]
impl PluginAdapter for WhatsAppChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        match self.client.session_state().await? {
            SessionState::Authenticated => Ok(HealthStatus::Healthy),
            SessionState::Other(state) => Ok(HealthStatus::Unhealthy(format!(
                "whatsapp session not authenticated: {state}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for WhatsAppChannel {
    fn channel(&self) -> DeliveryChannel {
        DeliveryChannel::Whatsapp
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, ParleyError> {
        let to = self.phone.transport_form(&msg.recipient, TransportStyle::Bare)?;
        let id = self
            .client
            .send_text(&to, &msg.body, msg.credential.as_deref())
            .await?;
        debug!(account = %self.name, message_id = %id, "whatsapp message sent");
        Ok(MessageId(id))
    }
}
