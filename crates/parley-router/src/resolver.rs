// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation find-or-create.
//!
//! Resolution order:
//! 1. exact `(channel, handle)` match
//! 2. phone channels only, full 10-digit handles only: first conversation
//!    whose handle ends with the comparison-form suffix
//! 3. routed creation (binding defaults, falling back to the default bucket)

use parley_core::identity::{canonical_handle, comparison_form, COMPARISON_DIGITS};
use parley_core::types::{Channel, Conversation};
use parley_core::ParleyError;
use parley_storage::queries::{columns, conversations};
use parley_storage::{Database, NewConversation};
use tracing::{debug, info};

use crate::binding::ChannelRouter;

/// A resolved conversation and whether this call created it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub conversation: Conversation,
    pub created: bool,
}

#[derive(Clone)]
pub struct ConversationResolver {
    db: Database,
    router: ChannelRouter,
}

impl ConversationResolver {
    pub fn new(db: Database, router: ChannelRouter) -> Self {
        Self { db, router }
    }

    /// Find or create the conversation for `handle` on `channel`.
    ///
    /// `reference` is the account identifier used for routing a new
    /// conversation; the handle is used when it is absent.
    pub async fn resolve(
        &self,
        channel: Channel,
        handle: &str,
        reference: Option<&str>,
    ) -> Result<Resolution, ParleyError> {
        let canonical = canonical_handle(channel, handle)?;

        if let Some(conversation) = conversations::find_by_handle(&self.db, channel, &canonical).await? {
            return Ok(Resolution {
                conversation,
                created: false,
            });
        }

        let suffix = comparison_form(&canonical);
        if channel.is_phone_based()
            && suffix.len() == COMPARISON_DIGITS
            && let Some(conversation) =
                conversations::find_by_handle_suffix(&self.db, channel, &suffix).await?
        {
            debug!(
                conversation_id = %conversation.id,
                stored_handle = %conversation.handle,
                "fuzzy handle match"
            );
            return Ok(Resolution {
                conversation,
                created: false,
            });
        }

        let routing = self
            .router
            .routing(channel, reference.unwrap_or(handle))
            .await;
        let column_id = match routing.column_id {
            Some(id) => Some(id),
            None => columns::default_column(&self.db).await?.map(|c| c.id),
        };

        let conversation = conversations::create_conversation(
            &self.db,
            &NewConversation {
                channel,
                handle: canonical,
                column_id,
                agent_override_id: routing.agent_id,
                channel_binding_id: routing.channel_binding_id,
                traffic_source: Some(routing.traffic_source),
            },
        )
        .await?;

        info!(
            conversation_id = %conversation.id,
            %channel,
            column_id = ?conversation.column_id,
            traffic_source = ?conversation.traffic_source,
            "conversation created"
        );
        Ok(Resolution {
            conversation,
            created: true,
        })
    }
}
