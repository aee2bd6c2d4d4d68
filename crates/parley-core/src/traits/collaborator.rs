// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External collaborators consumed by the ingestion pipeline.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::types::{
    Channel, ContactProfile, Conversation, ConversationFacts, Message, ResponseRequest,
};

/// Automated response generator.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Returns reply text, or `None` when the responder has nothing to say.
    async fn respond(&self, request: ResponseRequest) -> Result<Option<String>, ParleyError>;
}

/// Derives structured facts from a conversation transcript.
#[async_trait]
pub trait FactExtractor: Send + Sync {
    /// Returns refreshed facts, or `None` to leave the stored facts untouched.
    async fn extract(
        &self,
        conversation: &Conversation,
        transcript: &[Message],
    ) -> Result<Option<ConversationFacts>, ParleyError>;
}

/// Source of contact details (name, avatar, lifetime value).
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn lookup(
        &self,
        channel: Channel,
        handle: &str,
    ) -> Result<Option<ContactProfile>, ParleyError>;
}
