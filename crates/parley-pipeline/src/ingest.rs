// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound ingestion.
//!
//! One call takes a normalized provider event through the whole path:
//!
//! 1. resolve (or create) the conversation and queue a contact refresh
//! 2. drop duplicates by provider id
//! 3. suppress provider echoes of content we just sent
//! 4. persist the message and update the conversation preview
//! 5. inbound only: run trigger rules before the gate sees the conversation
//! 6. gate the responder and append its reply as an outbound message
//! 7. inbound only: queue a fact sync
//!
//! Only persistence failures are returned; everything after the message
//! write is logged and swallowed.

use std::sync::Arc;
use std::time::Duration;

use parley_config::model::IngestConfig;
use parley_core::traits::collaborator::Responder;
use parley_core::types::{
    Channel, Conversation, DeliveryStatus, Direction, HistoryEntry, Message, MessageType,
    NewMessage, ResponseRequest, Role,
};
use parley_core::ParleyError;
use parley_router::ConversationResolver;
use parley_rules::RuleEngine;
use parley_storage::queries::{columns, conversations, messages};
use parley_storage::{format_timestamp, Database};
use tracing::{debug, info, warn};

use crate::gate::{GateDecision, GateInput, ResponseGate};
use crate::worker::{BackgroundJob, WorkerHandle};

/// Provider-side metadata carried with an inbound event.
#[derive(Debug, Clone)]
pub struct ProviderMeta {
    /// Provider message id; the dedup key when present.
    pub id: Option<String>,
    /// Account the event arrived on, used to route new conversations.
    pub reference: Option<String>,
    pub direction: Direction,
    pub role: Role,
    pub message_type: MessageType,
    /// The payload was authored by our own account.
    pub from_me: bool,
    pub raw: Option<serde_json::Value>,
}

impl Default for ProviderMeta {
    fn default() -> Self {
        Self {
            id: None,
            reference: None,
            direction: Direction::Inbound,
            role: Role::User,
            message_type: MessageType::Text,
            from_me: false,
            raw: None,
        }
    }
}

impl ProviderMeta {
    /// Metadata for a payload our own account sent through the provider.
    pub fn self_authored(id: Option<String>) -> Self {
        Self {
            id,
            direction: Direction::Outbound,
            role: Role::Assistant,
            from_me: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub channel: Channel,
    pub handle: String,
    pub content: String,
    pub meta: ProviderMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Stored,
    /// The provider id was already ingested; the existing row is returned.
    Duplicate,
    /// Echo of a message we sent moments ago; nothing was written.
    EchoSuppressed,
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The stored message, the pre-existing duplicate, or the outbound
    /// message an echo was matched against.
    pub message: Message,
    pub disposition: Disposition,
    pub conversation_created: bool,
    /// Automated reply appended by this call, if any.
    pub reply: Option<Message>,
}

#[derive(Clone)]
pub struct IngestPipeline {
    db: Database,
    resolver: ConversationResolver,
    rules: RuleEngine,
    gate: Arc<ResponseGate>,
    responder: Arc<dyn Responder>,
    worker: WorkerHandle,
    config: IngestConfig,
}

impl IngestPipeline {
    pub fn new(
        db: Database,
        resolver: ConversationResolver,
        rules: RuleEngine,
        gate: Arc<ResponseGate>,
        responder: Arc<dyn Responder>,
        worker: WorkerHandle,
        config: IngestConfig,
    ) -> Self {
        Self {
            db,
            resolver,
            rules,
            gate,
            responder,
            worker,
            config,
        }
    }

    pub async fn ingest(&self, event: InboundEvent) -> Result<IngestOutcome, ParleyError> {
        let InboundEvent {
            channel,
            handle,
            content,
            meta,
        } = event;

        let resolution = self
            .resolver
            .resolve(channel, &handle, meta.reference.as_deref())
            .await?;
        let conversation = resolution.conversation;
        self.submit(BackgroundJob::RefreshContact {
            channel,
            handle: conversation.handle.clone(),
        })
        .await;

        if let Some(external_id) = &meta.id
            && let Some(existing) = messages::find_by_external_id(&self.db, external_id).await?
        {
            debug!(external_id, message_id = %existing.id, "duplicate provider message");
            return Ok(IngestOutcome {
                message: existing,
                disposition: Disposition::Duplicate,
                conversation_created: resolution.created,
                reply: None,
            });
        }

        if meta.direction == Direction::Outbound
            && let Some(sent) = self.recent_echo(&conversation.id, &content).await?
        {
            debug!(conversation_id = %conversation.id, message_id = %sent.id, "provider echo suppressed");
            return Ok(IngestOutcome {
                message: sent,
                disposition: Disposition::EchoSuppressed,
                conversation_created: resolution.created,
                reply: None,
            });
        }

        let stored = messages::insert_message(
            &self.db,
            &NewMessage {
                conversation_id: conversation.id.clone(),
                direction: meta.direction,
                role: meta.role,
                message_type: meta.message_type,
                status: DeliveryStatus::Delivered,
                external_id: meta.id.clone(),
                content: content.clone(),
                raw_payload: meta.raw.clone(),
                skip_dispatch: meta.from_me,
            },
        )
        .await?;
        if !stored.inserted {
            debug!(message_id = %stored.message.id, "duplicate provider message (insert race)");
            return Ok(IngestOutcome {
                message: stored.message,
                disposition: Disposition::Duplicate,
                conversation_created: resolution.created,
                reply: None,
            });
        }
        let message = stored.message;
        self.touch(&conversation.id, &content, &message.created_at).await?;

        info!(
            conversation_id = %conversation.id,
            message_id = %message.id,
            direction = %message.direction,
            message_type = %message.message_type,
            "message ingested"
        );

        let inbound = message.direction == Direction::Inbound;
        if inbound {
            match self
                .rules
                .evaluate(
                    &message.id,
                    &content,
                    &conversation.id,
                    conversation.channel_binding_id.as_deref(),
                )
                .await
            {
                Ok(evaluation) if !evaluation.fired.is_empty() => {
                    debug!(conversation_id = %conversation.id, fired = ?evaluation.fired, "rules fired");
                }
                Ok(_) => {}
                Err(e) => warn!(conversation_id = %conversation.id, error = %e, "rule evaluation failed (non-fatal)"),
            }
        }

        let reply = self.respond(&conversation.id, &message, &meta).await;

        if inbound {
            self.submit(BackgroundJob::SyncFacts {
                conversation_id: conversation.id.clone(),
            })
            .await;
        }

        Ok(IngestOutcome {
            message,
            disposition: Disposition::Stored,
            conversation_created: resolution.created,
            reply,
        })
    }

    /// Append an outbound message to a conversation and queue its dispatch.
    pub async fn append_outbound(
        &self,
        conversation_id: &str,
        content: &str,
        role: Role,
        message_type: MessageType,
    ) -> Result<Message, ParleyError> {
        let new = NewMessage {
            conversation_id: conversation_id.to_string(),
            direction: Direction::Outbound,
            role,
            message_type,
            status: DeliveryStatus::Queued,
            external_id: None,
            content: content.to_string(),
            raw_payload: None,
            skip_dispatch: false,
        };
        let message = messages::insert_message(&self.db, &new).await?.message;
        self.touch(conversation_id, content, &message.created_at).await?;

        if new.needs_dispatch() {
            self.submit(BackgroundJob::Dispatch {
                conversation_id: conversation_id.to_string(),
                message_id: message.id.clone(),
                content: content.to_string(),
                message_type,
            })
            .await;
        }
        Ok(message)
    }

    async fn recent_echo(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> Result<Option<Message>, ParleyError> {
        let window = chrono::Duration::from_std(Duration::from_secs(self.config.echo_window_secs))
            .unwrap_or_else(|_| chrono::Duration::seconds(5));
        let since = format_timestamp(chrono::Utc::now() - window);
        messages::find_recent_outbound(&self.db, conversation_id, content, &since).await
    }

    async fn touch(&self, conversation_id: &str, content: &str, at: &str) -> Result<(), ParleyError> {
        let summary = preview(content, self.config.summary_max_chars);
        conversations::touch_conversation(&self.db, conversation_id, &summary, at).await?;
        Ok(())
    }

    /// Gate the message and, when allowed, ask the responder for a reply.
    ///
    /// The conversation is re-read so rule actions applied moments ago are
    /// visible to the gate.
    async fn respond(
        &self,
        conversation_id: &str,
        message: &Message,
        meta: &ProviderMeta,
    ) -> Option<Message> {
        let conversation = match self.current(conversation_id).await {
            Ok(c) => c,
            Err(e) => {
                warn!(conversation_id, error = %e, "conversation reload failed, skipping responder");
                return None;
            }
        };
        let column = match &conversation.column_id {
            Some(id) => match columns::get_column(&self.db, id).await {
                Ok(column) => column,
                Err(e) => {
                    warn!(conversation_id, error = %e, "bucket lookup failed, skipping responder");
                    return None;
                }
            },
            None => None,
        };

        let decision = self.gate.evaluate(&GateInput {
            conversation: &conversation,
            column: column.as_ref(),
            content: &message.content,
            direction: meta.direction,
            role: meta.role,
            from_me: meta.from_me,
        });
        let GateDecision::Allow(plan) = decision else {
            return None;
        };

        let history = match messages::recent_messages(&self.db, conversation_id, self.config.history_limit).await {
            Ok(history) => history,
            Err(e) => {
                warn!(conversation_id, error = %e, "history load failed, skipping responder");
                return None;
            }
        };

        let request = ResponseRequest {
            conversation_id: conversation_id.to_string(),
            agent_id: plan.agent_id,
            model: plan.model,
            tools: plan.tools,
            content: message.content.clone(),
            history: history
                .into_iter()
                .map(|m| HistoryEntry {
                    role: m.role,
                    content: m.content,
                })
                .collect(),
        };

        let text = match self.responder.respond(request).await {
            Ok(Some(text)) if !text.trim().is_empty() => text,
            Ok(_) => {
                debug!(conversation_id, "responder returned no reply");
                return None;
            }
            Err(e) => {
                warn!(conversation_id, error = %e, "responder failed (non-fatal)");
                return None;
            }
        };

        match self
            .append_outbound(conversation_id, &text, Role::Assistant, MessageType::Text)
            .await
        {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!(conversation_id, error = %e, "failed to store automated reply");
                None
            }
        }
    }

    async fn current(&self, conversation_id: &str) -> Result<Conversation, ParleyError> {
        conversations::get_conversation(&self.db, conversation_id)
            .await?
            .ok_or_else(|| ParleyError::NotFound {
                entity: "conversation",
                id: conversation_id.to_string(),
            })
    }

    async fn submit(&self, job: BackgroundJob) {
        let kind = job.kind();
        if let Err(e) = self.worker.submit(job).await {
            warn!(job = kind, error = %e, "background job not queued (non-fatal)");
        }
    }
}

/// First `max_chars` characters of `content`, whitespace collapsed.
pub fn preview(content: &str, max_chars: usize) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
