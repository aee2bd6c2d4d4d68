// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by storage, routing, the ingestion pipeline, and
//! the channel adapters.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Provider-assigned identifier for a dispatched message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

// --- Conversation model ---

/// Channel code a conversation lives on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    Wa,
    Ig,
    Fb,
    Email,
    Webchat,
}

impl Channel {
    /// Platform name used by channel bindings.
    pub fn platform(self) -> Platform {
        match self {
            Channel::Wa => Platform::Whatsapp,
            Channel::Ig => Platform::Instagram,
            Channel::Fb => Platform::Facebook,
            Channel::Email => Platform::Email,
            Channel::Webchat => Platform::Webchat,
        }
    }

    /// Whether handles on this channel are phone numbers.
    pub fn is_phone_based(self) -> bool {
        matches!(self, Channel::Wa)
    }

    /// Outbound transport for replies on this channel, if one exists.
    pub fn delivery_channel(self) -> Option<DeliveryChannel> {
        match self {
            Channel::Wa => Some(DeliveryChannel::Whatsapp),
            Channel::Email => Some(DeliveryChannel::Email),
            Channel::Ig | Channel::Fb | Channel::Webchat => None,
        }
    }
}

/// Messaging platform a channel binding belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Whatsapp,
    Instagram,
    Facebook,
    Email,
    Webchat,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Paused,
    Review,
    Archived,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    File,
    Template,
    Event,
    Sticker,
    Reaction,
    Interactive,
    Button,
}

/// Delivery state of a stored message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Queued,
    Sent,
    Delivered,
    Read,
    Failed,
}

/// Derived knowledge about the contact, refreshed by fact sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationFacts {
    pub personality: Vec<String>,
    pub interests: Vec<String>,
    pub intent_score: Option<u8>,
    pub friction_score: Option<u8>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub action_plan: Vec<String>,
    /// The single open question the system is waiting on, if any.
    pub system_inquiry: Option<SystemInquiry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInquiry {
    pub question: String,
    pub asked_at: String,
}

/// A conversation identified by `(channel, handle)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub channel: Channel,
    pub handle: String,
    pub status: ConversationStatus,
    pub column_id: Option<String>,
    pub agent_override_id: Option<String>,
    pub model_override: Option<String>,
    pub channel_binding_id: Option<String>,
    pub traffic_source: Option<String>,
    pub summary: Option<String>,
    pub facts: ConversationFacts,
    pub last_message_at: Option<String>,
    pub created_at: String,
}

/// A stored message belonging to exactly one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub direction: Direction,
    pub role: Role,
    pub message_type: MessageType,
    pub status: DeliveryStatus,
    pub external_id: Option<String>,
    pub content: String,
    pub raw_payload: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: String,
}

/// A message about to be appended to a conversation.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: String,
    pub direction: Direction,
    pub role: Role,
    pub message_type: MessageType,
    pub status: DeliveryStatus,
    pub external_id: Option<String>,
    pub content: String,
    pub raw_payload: Option<serde_json::Value>,
    /// Never forwarded to the external channel, even when outbound.
    pub skip_dispatch: bool,
}

impl NewMessage {
    /// Whether appending this message must trigger an outbound send.
    pub fn needs_dispatch(&self) -> bool {
        self.direction == Direction::Outbound && self.role != Role::System && !self.skip_dispatch
    }
}

// --- Ownership buckets ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ColumnMode {
    /// Automated responses allowed.
    Ai,
    /// Manual-only; the responder stays silent.
    Human,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolsMode {
    #[default]
    Inherit,
    Override,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsPolicy {
    pub mode: ToolsMode,
    pub allowed_tools: Vec<String>,
}

/// Per-bucket responder settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub agent_id: Option<String>,
    pub model: Option<String>,
    pub tools_policy: ToolsPolicy,
}

/// Ownership bucket ("column") a conversation is assigned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub name: String,
    pub position: i64,
    pub mode: ColumnMode,
    pub is_active: bool,
    pub config: ColumnConfig,
    pub created_at: String,
}

// --- Channel bindings ---

/// A configured account on a messaging platform with default routing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBinding {
    pub id: String,
    pub platform: Platform,
    pub account_reference: String,
    pub is_active: bool,
    /// Serves identifiers that match no exact binding on the platform.
    pub is_generic: bool,
    pub default_column_id: Option<String>,
    pub default_agent_id: Option<String>,
    pub traffic_source: Option<String>,
    /// Custom send credential used instead of the default account token.
    #[serde(skip_serializing)]
    pub credential: Option<String>,
    pub created_at: String,
}

/// Routing metadata used when a new conversation is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub column_id: Option<String>,
    pub agent_id: Option<String>,
    pub traffic_source: String,
    pub channel_binding_id: Option<String>,
}

impl RoutingDecision {
    /// Decision used when no binding resolves.
    pub fn direct() -> Self {
        Self {
            column_id: None,
            agent_id: None,
            traffic_source: "direct".to_string(),
            channel_binding_id: None,
        }
    }
}

// --- Trigger rules ---

/// What a trigger rule matches on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleTrigger {
    Keyword {
        keywords: Vec<String>,
    },
    Regex {
        pattern: String,
        #[serde(default)]
        flags: Option<String>,
    },
    /// Evaluated by an external classifier; never matches locally.
    Intent {
        #[serde(default)]
        intents: Vec<String>,
    },
    /// Evaluated by an external classifier; never matches locally.
    Mood {
        #[serde(default)]
        moods: Vec<String>,
    },
}

impl RuleTrigger {
    pub fn kind(&self) -> &'static str {
        match self {
            RuleTrigger::Keyword { .. } => "keyword",
            RuleTrigger::Regex { .. } => "regex",
            RuleTrigger::Intent { .. } => "intent",
            RuleTrigger::Mood { .. } => "mood",
        }
    }
}

/// Side effect a matching rule applies to the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    MoveColumn { column_id: String },
    AssignAgent { agent_id: String },
    SetStatus { status: ConversationStatus },
}

/// A content-matching rule scoped globally or to one channel binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRule {
    pub id: String,
    pub name: String,
    pub channel_binding_id: Option<String>,
    pub is_global: bool,
    pub is_active: bool,
    pub trigger: RuleTrigger,
    pub priority: i64,
    pub actions: Vec<RuleAction>,
    pub stop_propagation: bool,
}

// --- Contacts ---

/// Contact details supplied by an external directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactProfile {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub lifetime_value: f64,
}

/// Cached contact details stored next to conversations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactSnapshot {
    pub handle: String,
    pub channel: Channel,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub lifetime_value: f64,
    pub risk_level: String,
    pub updated_at: String,
}

// --- Outbound delivery ---

/// Outbound transport kind used by the dispatcher and the fallback router.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryChannel {
    Whatsapp,
    Email,
    Sms,
    Push,
}

/// Priority class selecting channel order and sequential vs parallel delivery.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PriorityClass {
    Instant,
    Informational,
    Transactional,
    Critical,
}

/// A message handed to a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Recipient address in any form; adapters convert to their transport form.
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
    /// Overrides the adapter's default credential for this send.
    pub credential: Option<String>,
}

impl OutboundMessage {
    pub fn new(recipient: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            subject: None,
            body: body.into(),
            credential: None,
        }
    }
}

// --- Responder ---

/// Input handed to the automated responder once the gate allows a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRequest {
    pub conversation_id: String,
    pub agent_id: String,
    pub model: String,
    pub tools: Vec<String>,
    pub content: String,
    pub history: Vec<HistoryEntry>,
}

/// One prior message in the transcript given to the responder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}
