// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation CRUD operations.
//!
//! `(channel, handle)` is unique; creation is an insert-or-ignore followed by
//! a reselect, so concurrent first contacts converge on one row.

use parley_core::types::{Channel, Conversation, ConversationFacts, ConversationStatus};
use parley_core::ParleyError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, now_timestamp, Database};
use crate::models::{enum_column, json_column, new_id, to_json, NewConversation};

const CONVERSATION_FIELDS: &str = "id, channel, handle, status, column_id, agent_override_id, \
     model_override, channel_binding_id, traffic_source, summary, facts, last_message_at, created_at";

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        channel: enum_column(row, 1)?,
        handle: row.get(2)?,
        status: enum_column(row, 3)?,
        column_id: row.get(4)?,
        agent_override_id: row.get(5)?,
        model_override: row.get(6)?,
        channel_binding_id: row.get(7)?,
        traffic_source: row.get(8)?,
        summary: row.get(9)?,
        facts: json_column(row, 10)?,
        last_message_at: row.get(11)?,
        created_at: row.get(12)?,
    })
}

fn select_by_handle(
    conn: &rusqlite::Connection,
    channel: &str,
    handle: &str,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!("SELECT {CONVERSATION_FIELDS} FROM conversations WHERE channel = ?1 AND handle = ?2"),
        params![channel, handle],
        row_to_conversation,
    )
    .optional()
}

/// Create a conversation, or return the row that already holds `(channel, handle)`.
pub async fn create_conversation(
    db: &Database,
    new: &NewConversation,
) -> Result<Conversation, ParleyError> {
    let new = new.clone();
    let id = new_id();
    let created_at = now_timestamp();
    let channel = new.channel.to_string();
    let handle = new.handle.clone();
    let stored = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations (id, channel, handle, status, column_id, agent_override_id,
                     channel_binding_id, traffic_source, facts, created_at)
                 VALUES (?1, ?2, ?3, 'active', ?4, ?5, ?6, ?7, '{}', ?8)
                 ON CONFLICT(channel, handle) DO NOTHING",
                params![
                    id,
                    channel,
                    new.handle,
                    new.column_id,
                    new.agent_override_id,
                    new.channel_binding_id,
                    new.traffic_source,
                    created_at,
                ],
            )?;
            select_by_handle(conn, &channel, &new.handle)
        })
        .await
        .map_err(map_tr_err)?;
    stored.ok_or_else(|| ParleyError::Internal(format!("conversation {handle} vanished after insert")))
}

pub async fn get_conversation(db: &Database, id: &str) -> Result<Option<Conversation>, ParleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {CONVERSATION_FIELDS} FROM conversations WHERE id = ?1"),
                params![id],
                row_to_conversation,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Exact lookup on the canonical `(channel, handle)` pair.
pub async fn find_by_handle(
    db: &Database,
    channel: Channel,
    handle: &str,
) -> Result<Option<Conversation>, ParleyError> {
    let handle = handle.to_string();
    db.connection()
        .call(move |conn| select_by_handle(conn, &channel.to_string(), &handle))
        .await
        .map_err(map_tr_err)
}

/// First conversation on `channel` whose handle ends with `suffix`, in insertion order.
pub async fn find_by_handle_suffix(
    db: &Database,
    channel: Channel,
    suffix: &str,
) -> Result<Option<Conversation>, ParleyError> {
    let suffix = suffix.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {CONVERSATION_FIELDS} FROM conversations
                     WHERE channel = ?1 AND substr(handle, -length(?2)) = ?2
                     ORDER BY rowid ASC LIMIT 1"
                ),
                params![channel.to_string(), suffix],
                row_to_conversation,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Conversations with the most recent activity first.
pub async fn list_conversations(
    db: &Database,
    status: Option<ConversationStatus>,
    limit: i64,
) -> Result<Vec<Conversation>, ParleyError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_FIELDS} FROM conversations
                 WHERE ?1 IS NULL OR status = ?1
                 ORDER BY COALESCE(last_message_at, created_at) DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(
                params![status.map(|s| s.to_string()), limit],
                row_to_conversation,
            )?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Record new activity: bump `last_message_at` and replace the summary preview.
pub async fn touch_conversation(
    db: &Database,
    id: &str,
    summary: &str,
    at: &str,
) -> Result<(), ParleyError> {
    let (id, summary, at) = (id.to_string(), summary.to_string(), at.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET summary = ?1, last_message_at = ?2 WHERE id = ?3",
                params![summary, at, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Move a conversation to another bucket. Returns false when it does not exist.
pub async fn set_column(db: &Database, id: &str, column_id: &str) -> Result<bool, ParleyError> {
    update_field(db, "column_id", id, column_id.to_string()).await
}

pub async fn set_agent(db: &Database, id: &str, agent_id: &str) -> Result<bool, ParleyError> {
    update_field(db, "agent_override_id", id, agent_id.to_string()).await
}

pub async fn set_status(
    db: &Database,
    id: &str,
    status: ConversationStatus,
) -> Result<bool, ParleyError> {
    update_field(db, "status", id, status.to_string()).await
}

async fn update_field(
    db: &Database,
    column: &'static str,
    id: &str,
    value: String,
) -> Result<bool, ParleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!("UPDATE conversations SET {column} = ?1 WHERE id = ?2"),
                params![value, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Replace the derived facts document.
pub async fn update_facts(
    db: &Database,
    id: &str,
    facts: &ConversationFacts,
) -> Result<bool, ParleyError> {
    let id = id.to_string();
    let facts = facts.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE conversations SET facts = ?1 WHERE id = ?2",
                params![to_json(&facts)?, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a conversation and, through the foreign key, all of its messages.
pub async fn delete_conversation(db: &Database, id: &str) -> Result<bool, ParleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wa(handle: &str) -> NewConversation {
        NewConversation {
            channel: Channel::Wa,
            handle: handle.to_string(),
            column_id: None,
            agent_override_id: None,
            channel_binding_id: None,
            traffic_source: Some("direct".to_string()),
        }
    }

    #[tokio::test]
    async fn create_is_idempotent_per_handle() {
        let db = Database::open_in_memory().await.unwrap();
        let first = create_conversation(&db, &wa("5512345678")).await.unwrap();
        let second = create_conversation(&db, &wa("5512345678")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.status, ConversationStatus::Active);
        assert_eq!(first.facts, ConversationFacts::default());

        let mut email = wa("5512345678");
        email.channel = Channel::Email;
        let other = create_conversation(&db, &email).await.unwrap();
        assert_ne!(other.id, first.id);
    }

    #[tokio::test]
    async fn concurrent_creates_converge() {
        let db = Database::open_in_memory().await.unwrap();
        let new = wa("5500000001");
        let (a, b) = tokio::join!(create_conversation(&db, &new), create_conversation(&db, &new));
        assert_eq!(a.unwrap().id, b.unwrap().id);
        let all = list_conversations(&db, None, 10).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn suffix_lookup_returns_first_inserted() {
        let db = Database::open_in_memory().await.unwrap();
        let legacy = create_conversation(&db, &wa("5215512345678")).await.unwrap();
        create_conversation(&db, &wa("15512345678")).await.unwrap();

        let found = find_by_handle_suffix(&db, Channel::Wa, "5512345678")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, legacy.id);

        assert!(find_by_handle_suffix(&db, Channel::Ig, "5512345678")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn updates_and_delete() {
        let db = Database::open_in_memory().await.unwrap();
        let conv = create_conversation(&db, &wa("5512345678")).await.unwrap();

        assert!(set_status(&db, &conv.id, ConversationStatus::Review).await.unwrap());
        assert!(set_agent(&db, &conv.id, "closer").await.unwrap());
        touch_conversation(&db, &conv.id, "hola", "2026-03-01T10:00:00.000Z")
            .await
            .unwrap();
        let facts = ConversationFacts {
            user_name: Some("Ana".to_string()),
            intent_score: Some(8),
            ..Default::default()
        };
        assert!(update_facts(&db, &conv.id, &facts).await.unwrap());

        let stored = get_conversation(&db, &conv.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConversationStatus::Review);
        assert_eq!(stored.agent_override_id.as_deref(), Some("closer"));
        assert_eq!(stored.summary.as_deref(), Some("hola"));
        assert_eq!(stored.facts, facts);

        assert!(delete_conversation(&db, &conv.id).await.unwrap());
        assert!(!delete_conversation(&db, &conv.id).await.unwrap());
        assert!(!set_status(&db, &conv.id, ConversationStatus::Active).await.unwrap());
    }

    #[tokio::test]
    async fn list_orders_by_recent_activity() {
        let db = Database::open_in_memory().await.unwrap();
        let old = create_conversation(&db, &wa("5500000001")).await.unwrap();
        let new = create_conversation(&db, &wa("5500000002")).await.unwrap();
        touch_conversation(&db, &old.id, "late", "2099-01-01T00:00:00.000Z")
            .await
            .unwrap();
        set_status(&db, &new.id, ConversationStatus::Archived).await.unwrap();

        let all = list_conversations(&db, None, 10).await.unwrap();
        assert_eq!(all[0].id, old.id);
        let archived = list_conversations(&db, Some(ConversationStatus::Archived), 10)
            .await
            .unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].id, new.id);
    }
}
