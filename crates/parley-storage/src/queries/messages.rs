// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message CRUD operations.

use parley_core::types::{DeliveryStatus, Direction, Message, NewMessage};
use parley_core::ParleyError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, now_timestamp, Database};
use crate::models::{enum_column, new_id, InsertOutcome};

const MESSAGE_FIELDS: &str = "id, conversation_id, direction, role, message_type, status, \
     external_id, content, raw_payload, error, created_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let raw: Option<String> = row.get(8)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        direction: enum_column(row, 2)?,
        role: enum_column(row, 3)?,
        message_type: enum_column(row, 4)?,
        status: enum_column(row, 5)?,
        external_id: row.get(6)?,
        content: row.get(7)?,
        // Unparseable payloads are kept out of the model rather than failing the read.
        raw_payload: raw.and_then(|r| serde_json::from_str(&r).ok()),
        error: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn select_by_external_id(
    conn: &rusqlite::Connection,
    external_id: &str,
) -> rusqlite::Result<Option<Message>> {
    conn.query_row(
        &format!("SELECT {MESSAGE_FIELDS} FROM messages WHERE external_id = ?1"),
        params![external_id],
        row_to_message,
    )
    .optional()
}

/// Append a message.
///
/// A message whose `external_id` is already stored is not inserted; the
/// existing row is returned with `inserted = false`.
pub async fn insert_message(db: &Database, new: &NewMessage) -> Result<InsertOutcome, ParleyError> {
    let message = Message {
        id: new_id(),
        conversation_id: new.conversation_id.clone(),
        direction: new.direction,
        role: new.role,
        message_type: new.message_type,
        status: new.status,
        external_id: new.external_id.clone(),
        content: new.content.clone(),
        raw_payload: new.raw_payload.clone(),
        error: None,
        created_at: now_timestamp(),
    };
    let raw = message.raw_payload.as_ref().map(|v| v.to_string());
    let row = message.clone();
    let existing = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!(
                    "INSERT INTO messages ({MESSAGE_FIELDS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10)
                     ON CONFLICT(external_id) DO NOTHING"
                ),
                params![
                    row.id,
                    row.conversation_id,
                    row.direction.to_string(),
                    row.role.to_string(),
                    row.message_type.to_string(),
                    row.status.to_string(),
                    row.external_id,
                    row.content,
                    raw,
                    row.created_at,
                ],
            )?;
            match (changed, &row.external_id) {
                (0, Some(external_id)) => select_by_external_id(conn, external_id),
                _ => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)?;

    Ok(match existing {
        Some(message) => InsertOutcome {
            message,
            inserted: false,
        },
        None => InsertOutcome {
            message,
            inserted: true,
        },
    })
}

pub async fn get_message(db: &Database, id: &str) -> Result<Option<Message>, ParleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {MESSAGE_FIELDS} FROM messages WHERE id = ?1"),
                params![id],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a message by its provider-assigned id.
pub async fn find_by_external_id(
    db: &Database,
    external_id: &str,
) -> Result<Option<Message>, ParleyError> {
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| select_by_external_id(conn, &external_id))
        .await
        .map_err(map_tr_err)
}

/// An outbound message on the conversation with identical content created at or after `since`.
pub async fn find_recent_outbound(
    db: &Database,
    conversation_id: &str,
    content: &str,
    since: &str,
) -> Result<Option<Message>, ParleyError> {
    let (conversation_id, content, since) = (
        conversation_id.to_string(),
        content.to_string(),
        since.to_string(),
    );
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {MESSAGE_FIELDS} FROM messages
                     WHERE conversation_id = ?1 AND direction = ?2 AND content = ?3
                       AND created_at >= ?4
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![
                    conversation_id,
                    Direction::Outbound.to_string(),
                    content,
                    since
                ],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Messages of a conversation in chronological order.
pub async fn list_messages(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<Message>, ParleyError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_FIELDS} FROM messages WHERE conversation_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id], row_to_message)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// The latest `limit` messages of a conversation, oldest first.
pub async fn recent_messages(
    db: &Database,
    conversation_id: &str,
    limit: usize,
) -> Result<Vec<Message>, ParleyError> {
    let conversation_id = conversation_id.to_string();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut messages = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_FIELDS} FROM messages WHERE conversation_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![conversation_id, limit], row_to_message)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)?;
    messages.reverse();
    Ok(messages)
}

/// Record a successful send: status `delivered` plus the provider id.
pub async fn mark_delivered(
    db: &Database,
    id: &str,
    external_id: Option<&str>,
) -> Result<(), ParleyError> {
    let id = id.to_string();
    let external_id = external_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET status = ?1, external_id = COALESCE(?2, external_id), error = NULL
                 WHERE id = ?3",
                params![DeliveryStatus::Delivered.to_string(), external_id, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a terminal send failure.
pub async fn mark_failed(db: &Database, id: &str, error: &str) -> Result<(), ParleyError> {
    let (id, error) = (id.to_string(), error.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET status = ?1, error = ?2 WHERE id = ?3",
                params![DeliveryStatus::Failed.to_string(), error, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a provider status report. Returns the number of rows matched.
pub async fn update_status_by_external_id(
    db: &Database,
    external_id: &str,
    status: DeliveryStatus,
) -> Result<usize, ParleyError> {
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET status = ?1 WHERE external_id = ?2",
                params![status.to_string(), external_id],
            )
        })
        .await
        .map_err(map_tr_err)
}
