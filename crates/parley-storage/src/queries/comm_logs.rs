// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Communication audit log written by the fallback router.

use parley_core::ParleyError;
use rusqlite::params;

use crate::database::{map_tr_err, Database};
use crate::models::{enum_column, json_column, to_json, CommunicationLog};

pub async fn insert_communication_log(
    db: &Database,
    log: &CommunicationLog,
) -> Result<(), ParleyError> {
    let log = log.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO communication_logs (id, client_id, conversation_id, recipient, priority,
                     channels_attempted, channel_used, success, results, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    log.id,
                    log.client_id,
                    log.conversation_id,
                    log.recipient,
                    log.priority.to_string(),
                    to_json(&log.channels_attempted)?,
                    log.channel_used.map(|c| c.to_string()),
                    log.success,
                    to_json(&log.results)?,
                    log.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent entries first.
pub async fn recent_communication_logs(
    db: &Database,
    limit: i64,
) -> Result<Vec<CommunicationLog>, ParleyError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, client_id, conversation_id, recipient, priority, channels_attempted,
                        channel_used, success, results, created_at
                 FROM communication_logs ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                let channel_used: Option<String> = row.get(6)?;
                Ok(CommunicationLog {
                    id: row.get(0)?,
                    client_id: row.get(1)?,
                    conversation_id: row.get(2)?,
                    recipient: row.get(3)?,
                    priority: enum_column(row, 4)?,
                    channels_attempted: json_column(row, 5)?,
                    channel_used: channel_used.and_then(|c| c.parse().ok()),
                    success: row.get(7)?,
                    results: json_column(row, 8)?,
                    created_at: row.get(9)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
