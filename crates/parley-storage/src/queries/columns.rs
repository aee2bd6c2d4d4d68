// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ownership bucket ("column") operations.

use parley_core::types::{Column, ColumnConfig, ColumnMode};
use parley_core::ParleyError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, now_timestamp, Database};
use crate::models::{enum_column, json_column, new_id, to_json, NewColumn};

const COLUMN_FIELDS: &str = "id, name, position, mode, is_active, config, created_at";

fn row_to_column(row: &rusqlite::Row<'_>) -> rusqlite::Result<Column> {
    Ok(Column {
        id: row.get(0)?,
        name: row.get(1)?,
        position: row.get(2)?,
        mode: enum_column(row, 3)?,
        is_active: row.get(4)?,
        config: json_column(row, 5)?,
        created_at: row.get(6)?,
    })
}

/// Create a bucket and return it.
pub async fn insert_column(db: &Database, column: &NewColumn) -> Result<Column, ParleyError> {
    let record = Column {
        id: new_id(),
        name: column.name.clone(),
        position: column.position,
        mode: column.mode,
        is_active: true,
        config: column.config.clone(),
        created_at: now_timestamp(),
    };
    let row = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO columns (id, name, position, mode, is_active, config, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.id,
                    row.name,
                    row.position,
                    row.mode.to_string(),
                    row.is_active,
                    to_json(&row.config)?,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(record)
}

pub async fn get_column(db: &Database, id: &str) -> Result<Option<Column>, ParleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMN_FIELDS} FROM columns WHERE id = ?1"),
                params![id],
                row_to_column,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All buckets in board order.
pub async fn list_columns(db: &Database) -> Result<Vec<Column>, ParleyError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMN_FIELDS} FROM columns ORDER BY position ASC, created_at ASC"
            ))?;
            let rows = stmt.query_map([], row_to_column)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// The active bucket with the lowest position, used when routing yields none.
pub async fn default_column(db: &Database) -> Result<Option<Column>, ParleyError> {
    db.connection()
        .call(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMN_FIELDS} FROM columns WHERE is_active = 1
                     ORDER BY position ASC, created_at ASC LIMIT 1"
                ),
                [],
                row_to_column,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Replace a bucket's responder config, optionally switching its mode.
///
/// Returns the updated bucket, or `None` when it does not exist.
pub async fn update_column_config(
    db: &Database,
    id: &str,
    config: &ColumnConfig,
    mode: Option<ColumnMode>,
) -> Result<Option<Column>, ParleyError> {
    let id = id.to_string();
    let config = config.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE columns SET config = ?1, mode = COALESCE(?2, mode) WHERE id = ?3",
                params![to_json(&config)?, mode.map(|m| m.to_string()), id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            conn.query_row(
                &format!("SELECT {COLUMN_FIELDS} FROM columns WHERE id = ?1"),
                params![id],
                row_to_column,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Activate or deactivate a bucket.
pub async fn set_column_active(db: &Database, id: &str, active: bool) -> Result<bool, ParleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE columns SET is_active = ?1 WHERE id = ?2",
                params![active, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}
