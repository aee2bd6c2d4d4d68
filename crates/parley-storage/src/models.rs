// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage-side records and row helpers.
//!
//! The domain types live in `parley-core::types`; this module adds the
//! records that only the persistence layer and its direct callers need.

use std::str::FromStr;

use parley_core::types::{
    Channel, ColumnMode, ColumnConfig, DeliveryChannel, Message, PriorityClass,
};
use serde::{Deserialize, Serialize};

/// Fields needed to create a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewConversation {
    pub channel: Channel,
    /// Canonical handle (comparison form for phone channels).
    pub handle: String,
    pub column_id: Option<String>,
    pub agent_override_id: Option<String>,
    pub channel_binding_id: Option<String>,
    pub traffic_source: Option<String>,
}

/// Result of appending a message.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOutcome {
    /// The stored row: the new one, or the pre-existing one on a duplicate id.
    pub message: Message,
    /// False when an existing row with the same external id won.
    pub inserted: bool,
}

/// Fields needed to create an ownership bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct NewColumn {
    pub name: String,
    pub position: i64,
    pub mode: ColumnMode,
    pub config: ColumnConfig,
}

/// Audit link recorded when a trigger rule fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTriggerRecord {
    pub id: String,
    pub conversation_id: String,
    pub rule_id: String,
    pub message_id: Option<String>,
    pub created_at: String,
}

/// Outcome of a single credential attempt inside a fallback send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAttempt {
    pub channel: DeliveryChannel,
    pub credential: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Communication-audit entry written for every fallback send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationLog {
    pub id: String,
    pub client_id: Option<String>,
    pub conversation_id: Option<String>,
    pub recipient: String,
    pub priority: PriorityClass,
    pub channels_attempted: Vec<DeliveryChannel>,
    pub channel_used: Option<DeliveryChannel>,
    pub success: bool,
    pub results: Vec<ChannelAttempt>,
    pub created_at: String,
}

/// Read a TEXT column holding a strum-encoded enum.
pub(crate) fn enum_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Read a TEXT column holding a JSON document.
pub(crate) fn json_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Serialize a value for a JSON TEXT column.
pub(crate) fn to_json<T: Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
