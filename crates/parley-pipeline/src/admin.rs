// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation and bucket administration.

use parley_core::types::{
    Column, ColumnConfig, ColumnMode, Conversation, ConversationStatus, DeliveryStatus, Direction,
    Message, MessageType, NewMessage, Role,
};
use parley_core::ParleyError;
use parley_storage::queries::{columns, conversations, messages};
use parley_storage::Database;
use tracing::info;

#[derive(Clone)]
pub struct ConversationAdmin {
    db: Database,
}

impl ConversationAdmin {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Most recently active conversations first.
    pub async fn list_conversations(
        &self,
        status: Option<ConversationStatus>,
        limit: i64,
    ) -> Result<Vec<Conversation>, ParleyError> {
        conversations::list_conversations(&self.db, status, limit).await
    }

    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, ParleyError> {
        self.require(conversation_id).await?;
        messages::list_messages(&self.db, conversation_id).await
    }

    /// Move a conversation to another bucket and leave a system event in
    /// its transcript. The event is never dispatched.
    pub async fn move_to_column(
        &self,
        conversation_id: &str,
        column_id: &str,
    ) -> Result<Conversation, ParleyError> {
        self.require(conversation_id).await?;
        let column = columns::get_column(&self.db, column_id)
            .await?
            .ok_or_else(|| ParleyError::NotFound {
                entity: "column",
                id: column_id.to_string(),
            })?;

        conversations::set_column(&self.db, conversation_id, &column.id).await?;
        messages::insert_message(
            &self.db,
            &NewMessage {
                conversation_id: conversation_id.to_string(),
                direction: Direction::Outbound,
                role: Role::System,
                message_type: MessageType::Event,
                status: DeliveryStatus::Delivered,
                external_id: None,
                content: format!("Moved to column {}", column.name),
                raw_payload: None,
                skip_dispatch: true,
            },
        )
        .await?;
        info!(conversation_id, column_id, column = %column.name, "conversation moved");
        self.require(conversation_id).await
    }

    pub async fn archive(&self, conversation_id: &str) -> Result<Conversation, ParleyError> {
        if !conversations::set_status(&self.db, conversation_id, ConversationStatus::Archived).await? {
            return Err(not_found(conversation_id));
        }
        info!(conversation_id, "conversation archived");
        self.require(conversation_id).await
    }

    /// Delete a conversation together with its messages.
    pub async fn delete(&self, conversation_id: &str) -> Result<(), ParleyError> {
        if !conversations::delete_conversation(&self.db, conversation_id).await? {
            return Err(not_found(conversation_id));
        }
        info!(conversation_id, "conversation deleted");
        Ok(())
    }

    pub async fn list_columns(&self) -> Result<Vec<Column>, ParleyError> {
        columns::list_columns(&self.db).await
    }

    pub async fn update_column(
        &self,
        column_id: &str,
        config: &ColumnConfig,
        mode: Option<ColumnMode>,
    ) -> Result<Column, ParleyError> {
        columns::update_column_config(&self.db, column_id, config, mode)
            .await?
            .ok_or_else(|| ParleyError::NotFound {
                entity: "column",
                id: column_id.to_string(),
            })
    }

    async fn require(&self, conversation_id: &str) -> Result<Conversation, ParleyError> {
        conversations::get_conversation(&self.db, conversation_id)
            .await?
            .ok_or_else(|| not_found(conversation_id))
    }
}

fn not_found(conversation_id: &str) -> ParleyError {
    ParleyError::NotFound {
        entity: "conversation",
        id: conversation_id.to_string(),
    }
}
