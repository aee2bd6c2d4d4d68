// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cached contact snapshots.

use parley_core::types::{Channel, ContactSnapshot};
use parley_core::ParleyError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::models::enum_column;

/// Insert or replace the snapshot for `(channel, handle)`.
pub async fn upsert_contact_snapshot(
    db: &Database,
    snapshot: &ContactSnapshot,
) -> Result<(), ParleyError> {
    let s = snapshot.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO contact_snapshots (channel, handle, name, avatar_url, lifetime_value,
                     risk_level, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(channel, handle) DO UPDATE SET
                     name = excluded.name,
                     avatar_url = excluded.avatar_url,
                     lifetime_value = excluded.lifetime_value,
                     risk_level = excluded.risk_level,
                     updated_at = excluded.updated_at",
                params![
                    s.channel.to_string(),
                    s.handle,
                    s.name,
                    s.avatar_url,
                    s.lifetime_value,
                    s.risk_level,
                    s.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_contact_snapshot(
    db: &Database,
    channel: Channel,
    handle: &str,
) -> Result<Option<ContactSnapshot>, ParleyError> {
    let handle = handle.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT handle, channel, name, avatar_url, lifetime_value, risk_level, updated_at
                 FROM contact_snapshots WHERE channel = ?1 AND handle = ?2",
                params![channel.to_string(), handle],
                |row| {
                    Ok(ContactSnapshot {
                        handle: row.get(0)?,
                        channel: enum_column(row, 1)?,
                        name: row.get(2)?,
                        avatar_url: row.get(3)?,
                        lifetime_value: row.get(4)?,
                        risk_level: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
