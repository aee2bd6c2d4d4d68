// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley conversation engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level Parley configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP gateway (webhooks and admin API).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Phone number transport rules.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Ingestion pipeline tuning.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Response gate rules and responder defaults.
    #[serde(default)]
    pub gate: GateConfig,

    /// Conversation dispatcher retry policy.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Background worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Multi-channel fallback router and health tracking.
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Bulk send pacing and hourly cap.
    #[serde(default)]
    pub bulk: BulkConfig,

    /// WhatsApp gateway credentials.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// SMTP email credentials.
    #[serde(default)]
    pub email: EmailConfig,

    /// SMS provider credentials.
    #[serde(default)]
    pub sms: SmsConfig,

    /// Push notification provider credentials.
    #[serde(default)]
    pub push: PushConfig,

    /// Automated responder endpoint.
    #[serde(default)]
    pub responder: ResponderConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "parley".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("parley").join("parley.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("parley.db"))
        .to_string_lossy()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Start the HTTP server in `serve`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on `/v1/*` routes. `None` rejects every request.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

/// Phone number transport rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Country calling code prepended to local 10-digit numbers.
    #[serde(default = "default_country_code")]
    pub country_code: String,

    /// Digit inserted after the country code for mobile numbers.
    #[serde(default = "default_mobile_indicator")]
    pub mobile_indicator: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            country_code: default_country_code(),
            mobile_indicator: default_mobile_indicator(),
        }
    }
}

fn default_country_code() -> String {
    "52".to_string()
}

fn default_mobile_indicator() -> String {
    "1".to_string()
}

/// Ingestion pipeline tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// Outbound payloads matching a message sent this recently are echoes.
    #[serde(default = "default_echo_window_secs")]
    pub echo_window_secs: u64,

    /// Maximum characters kept in the conversation summary preview.
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,

    /// Number of prior messages handed to the responder.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            echo_window_secs: default_echo_window_secs(),
            summary_max_chars: default_summary_max_chars(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_echo_window_secs() -> u64 {
    5
}

fn default_summary_max_chars() -> usize {
    140
}

fn default_history_limit() -> usize {
    20
}

/// Response gate rules and responder defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    /// Phrases the responder uses about itself; inbound content containing
    /// one of them is treated as a reply loop.
    #[serde(default = "default_self_signatures")]
    pub self_signatures: Vec<String>,

    /// Whole-message acknowledgements that never warrant a reply.
    #[serde(default = "default_low_value_phrases")]
    pub low_value_phrases: Vec<String>,

    /// Agent used when neither conversation nor bucket names one.
    #[serde(default = "default_agent")]
    pub default_agent: String,

    /// Model used when neither conversation nor bucket names one.
    #[serde(default = "default_responder_model")]
    pub default_model: String,

    /// Default tool whitelist per agent id.
    #[serde(default)]
    pub agent_tools: HashMap<String, Vec<String>>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            self_signatures: default_self_signatures(),
            low_value_phrases: default_low_value_phrases(),
            default_agent: default_agent(),
            default_model: default_responder_model(),
            agent_tools: HashMap::new(),
        }
    }
}

fn default_self_signatures() -> Vec<String> {
    vec!["test_09002".to_string(), "soy ara".to_string()]
}

fn default_low_value_phrases() -> Vec<String> {
    [
        "ok", "gracias", "thanks", "👍", "emoji", "hola", "hello", "hi", "si", "no", "chau",
        "bye",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_agent() -> String {
    "sales_ara".to_string()
}

fn default_responder_model() -> String {
    "gpt-4o".to_string()
}

/// Conversation dispatcher retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Total send attempts per outbound message (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Wait before re-looking up a status callback's target message.
    #[serde(default = "default_status_retry_delay_ms")]
    pub status_retry_delay_ms: u64,

    /// Per-request timeout for outbound HTTP calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            status_retry_delay_ms: default_status_retry_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_status_retry_delay_ms() -> u64 {
    2000
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Background worker settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Attempts per job before it is recorded as failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_worker_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_worker_retry_delay_ms(),
        }
    }
}

fn default_queue_capacity() -> usize {
    256
}

fn default_worker_retry_delay_ms() -> u64 {
    500
}

/// Multi-channel fallback router and health tracking.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FallbackConfig {
    /// Consecutive failures before a credential is degraded.
    #[serde(default = "default_degraded_after")]
    pub degraded_after: u32,

    /// Consecutive failures before a credential is down and skipped.
    #[serde(default = "default_down_after")]
    pub down_after: u32,

    /// Minimum gap between two admin alerts for the same credential.
    #[serde(default = "default_alert_cooldown_secs")]
    pub alert_cooldown_secs: u64,

    /// Channel fired as an independent backup for sequential classes.
    #[serde(default = "default_backup_channel")]
    pub backup_channel: String,

    /// Interval of the periodic credential health check (0 disables it).
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,

    /// Admin phone alerted when a credential goes down.
    #[serde(default)]
    pub alert_phone: Option<String>,

    /// Admin email alerted when a credential goes down.
    #[serde(default)]
    pub alert_email: Option<String>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            degraded_after: default_degraded_after(),
            down_after: default_down_after(),
            alert_cooldown_secs: default_alert_cooldown_secs(),
            backup_channel: default_backup_channel(),
            health_check_interval_secs: default_health_check_interval_secs(),
            alert_phone: None,
            alert_email: None,
        }
    }
}

fn default_degraded_after() -> u32 {
    1
}

fn default_down_after() -> u32 {
    3
}

fn default_alert_cooldown_secs() -> u64 {
    15 * 60
}

fn default_backup_channel() -> String {
    "email".to_string()
}

fn default_health_check_interval_secs() -> u64 {
    300
}

/// Bulk send pacing and hourly cap.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BulkConfig {
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Sends between two longer batch pauses.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_batch_pause_min_ms")]
    pub batch_pause_min_ms: u64,

    #[serde(default = "default_batch_pause_max_ms")]
    pub batch_pause_max_ms: u64,

    /// Sends allowed per rolling hour across all bulk runs.
    #[serde(default = "default_max_per_hour")]
    pub max_per_hour: u32,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            batch_size: default_batch_size(),
            batch_pause_min_ms: default_batch_pause_min_ms(),
            batch_pause_max_ms: default_batch_pause_max_ms(),
            max_per_hour: default_max_per_hour(),
        }
    }
}

fn default_min_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    300
}

fn default_batch_size() -> usize {
    50
}

fn default_batch_pause_min_ms() -> u64 {
    2000
}

fn default_batch_pause_max_ms() -> u64 {
    5000
}

fn default_max_per_hour() -> u32 {
    500
}

/// WhatsApp gateway credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    #[serde(default = "default_whatsapp_base_url")]
    pub base_url: String,

    /// Primary account token. `None` disables WhatsApp delivery.
    #[serde(default)]
    pub token: Option<String>,

    /// Backup account tokens, tried in order after the primary.
    #[serde(default)]
    pub backup_tokens: Vec<String>,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            base_url: default_whatsapp_base_url(),
            token: None,
            backup_tokens: Vec::new(),
        }
    }
}

fn default_whatsapp_base_url() -> String {
    "https://gate.whapi.cloud".to_string()
}

/// SMTP email credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    /// SMTP relay host. `None` disables email delivery.
    #[serde(default)]
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub from_address: Option<String>,

    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            from_address: None,
            from_name: default_from_name(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "Parley".to_string()
}

/// SMS provider credentials. All three of sid, token and sender are required.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SmsConfig {
    #[serde(default = "default_sms_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub account_sid: Option<String>,

    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default)]
    pub from_number: Option<String>,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            base_url: default_sms_base_url(),
            account_sid: None,
            auth_token: None,
            from_number: None,
        }
    }
}

impl SmsConfig {
    /// SMS is enabled only when every credential is present.
    pub fn is_configured(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some() && self.from_number.is_some()
    }
}

fn default_sms_base_url() -> String {
    "https://api.twilio.com".to_string()
}

/// Push notification provider credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PushConfig {
    #[serde(default = "default_push_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub app_id: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            base_url: default_push_base_url(),
            app_id: None,
            api_key: None,
        }
    }
}

fn default_push_base_url() -> String {
    "https://onesignal.com".to_string()
}

/// Automated responder endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResponderConfig {
    /// URL receiving response requests. `None` disables automated replies.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_responder_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: default_responder_timeout_secs(),
        }
    }
}

fn default_responder_timeout_secs() -> u64 {
    60
}
