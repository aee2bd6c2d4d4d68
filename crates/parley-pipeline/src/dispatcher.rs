// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation dispatcher.
//!
//! Sends a stored outbound message through the transport of its
//! conversation's channel with a fixed number of attempts, then records the
//! result on the message row. Provider status callbacks are reconciled here
//! as well.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use parley_config::model::DispatchConfig;
use parley_core::traits::channel::ChannelAdapter;
use parley_core::types::{DeliveryChannel, DeliveryStatus, MessageType, OutboundMessage};
use parley_core::ParleyError;
use parley_storage::queries::{bindings, conversations, messages};
use parley_storage::Database;

/// Result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { external_id: String, attempts: u32 },
    Failed { error: String, attempts: u32 },
}

pub struct Dispatcher {
    db: Database,
    adapters: HashMap<DeliveryChannel, Arc<dyn ChannelAdapter>>,
    max_attempts: u32,
    retry_delay: Duration,
    status_retry_delay: Duration,
}

impl Dispatcher {
    pub fn new(db: Database, config: &DispatchConfig) -> Self {
        Self {
            db,
            adapters: HashMap::new(),
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            status_retry_delay: Duration::from_millis(config.status_retry_delay_ms),
        }
    }

    /// Register the adapter serving one transport. A later registration for
    /// the same transport replaces the earlier one.
    pub fn register(&mut self, adapter: Arc<dyn ChannelAdapter>) {
        self.adapters.insert(adapter.channel(), adapter);
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Deliver message `message_id` of `conversation_id`.
    ///
    /// Delivery failures are recorded on the message and returned as
    /// [`DispatchOutcome::Failed`]; only storage failures are errors.
    pub async fn send(
        &self,
        conversation_id: &str,
        message_id: &str,
        content: &str,
        message_type: MessageType,
    ) -> Result<DispatchOutcome, ParleyError> {
        let conversation = conversations::get_conversation(&self.db, conversation_id)
            .await?
            .ok_or_else(|| ParleyError::NotFound {
                entity: "conversation",
                id: conversation_id.to_string(),
            })?;

        let Some(adapter) = conversation
            .channel
            .delivery_channel()
            .and_then(|kind| self.adapters.get(&kind))
        else {
            let error = format!("no outbound transport for channel {}", conversation.channel);
            warn!(conversation_id, message_id, %error, "dispatch skipped");
            messages::mark_failed(&self.db, message_id, &error).await?;
            return Ok(DispatchOutcome::Failed { error, attempts: 0 });
        };

        let credential = match &conversation.channel_binding_id {
            Some(binding_id) => bindings::get_binding(&self.db, binding_id)
                .await?
                .and_then(|b| b.credential),
            None => None,
        };

        let outbound = OutboundMessage {
            recipient: conversation.handle.clone(),
            subject: None,
            body: content.to_string(),
            credential,
        };

        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            match adapter.send(outbound.clone()).await {
                Ok(id) => {
                    messages::mark_delivered(&self.db, message_id, Some(&id.0)).await?;
                    info!(
                        conversation_id,
                        message_id,
                        external_id = %id.0,
                        adapter = adapter.name(),
                        %message_type,
                        attempt,
                        "message dispatched"
                    );
                    return Ok(DispatchOutcome::Delivered {
                        external_id: id.0,
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    warn!(conversation_id, message_id, attempt, error = %e, "dispatch attempt failed");
                    last_error = e.to_string();
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        error!(
            conversation_id,
            message_id,
            attempts = self.max_attempts,
            error = %last_error,
            "dispatch failed"
        );
        messages::mark_failed(&self.db, message_id, &last_error).await?;
        Ok(DispatchOutcome::Failed {
            error: last_error,
            attempts: self.max_attempts,
        })
    }

    /// Apply a provider status callback. Returns whether a message matched.
    ///
    /// A miss is retried once after a short delay, since the callback can
    /// outrun the write that stored the provider id.
    pub async fn update_status(
        &self,
        external_id: &str,
        status: DeliveryStatus,
    ) -> Result<bool, ParleyError> {
        if messages::update_status_by_external_id(&self.db, external_id, status).await? > 0 {
            debug!(external_id, %status, "status updated");
            return Ok(true);
        }

        tokio::time::sleep(self.status_retry_delay).await;
        if messages::update_status_by_external_id(&self.db, external_id, status).await? > 0 {
            debug!(external_id, %status, "status updated on retry");
            return Ok(true);
        }

        warn!(external_id, %status, "status callback matched no message");
        Ok(false)
    }
}
