// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel binding lookups.

use parley_core::types::{ChannelBinding, Platform};
use parley_core::ParleyError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, now_timestamp, Database};
use crate::models::{enum_column, new_id};

const BINDING_FIELDS: &str = "id, platform, account_reference, is_active, is_generic, \
     default_column_id, default_agent_id, traffic_source, credential, created_at";

fn row_to_binding(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelBinding> {
    Ok(ChannelBinding {
        id: row.get(0)?,
        platform: enum_column(row, 1)?,
        account_reference: row.get(2)?,
        is_active: row.get(3)?,
        is_generic: row.get(4)?,
        default_column_id: row.get(5)?,
        default_agent_id: row.get(6)?,
        traffic_source: row.get(7)?,
        credential: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Store a binding. An empty `id` or `created_at` is filled in.
pub async fn insert_binding(
    db: &Database,
    binding: &ChannelBinding,
) -> Result<ChannelBinding, ParleyError> {
    let mut record = binding.clone();
    if record.id.is_empty() {
        record.id = new_id();
    }
    if record.created_at.is_empty() {
        record.created_at = now_timestamp();
    }
    let row = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO channel_bindings ({BINDING_FIELDS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    row.id,
                    row.platform.to_string(),
                    row.account_reference,
                    row.is_active,
                    row.is_generic,
                    row.default_column_id,
                    row.default_agent_id,
                    row.traffic_source,
                    row.credential,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(record)
}

pub async fn get_binding(db: &Database, id: &str) -> Result<Option<ChannelBinding>, ParleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {BINDING_FIELDS} FROM channel_bindings WHERE id = ?1"),
                params![id],
                row_to_binding,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Active binding with exactly this `(platform, account_reference)`.
pub async fn find_active_binding(
    db: &Database,
    platform: Platform,
    account_reference: &str,
) -> Result<Option<ChannelBinding>, ParleyError> {
    let reference = account_reference.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {BINDING_FIELDS} FROM channel_bindings
                     WHERE platform = ?1 AND account_reference = ?2 AND is_active = 1"
                ),
                params![platform.to_string(), reference],
                row_to_binding,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Oldest active generic binding on a platform.
pub async fn oldest_generic_binding(
    db: &Database,
    platform: Platform,
) -> Result<Option<ChannelBinding>, ParleyError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {BINDING_FIELDS} FROM channel_bindings
                     WHERE platform = ?1 AND is_generic = 1 AND is_active = 1
                     ORDER BY created_at ASC, rowid ASC LIMIT 1"
                ),
                params![platform.to_string()],
                row_to_binding,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Bindings for a platform, active ones first.
pub async fn list_bindings(
    db: &Database,
    platform: Platform,
) -> Result<Vec<ChannelBinding>, ParleyError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BINDING_FIELDS} FROM channel_bindings WHERE platform = ?1
                 ORDER BY is_active DESC, created_at ASC"
            ))?;
            let rows = stmt.query_map(params![platform.to_string()], row_to_binding)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
