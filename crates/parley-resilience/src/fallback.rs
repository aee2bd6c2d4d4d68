// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-channel fallback router.
//!
//! Delivers a communication that is keyed by recipient rather than by
//! conversation. The priority class picks the transport order and whether
//! transports are tried one after another or all at once:
//!
//! | class         | transports                         | mode       |
//! |---------------|------------------------------------|------------|
//! | instant       | whatsapp, sms, push                | sequential |
//! | informational | whatsapp, email, push              | sequential |
//! | transactional | email, whatsapp                    | parallel   |
//! | critical      | whatsapp, sms, push, email, others | parallel   |
//!
//! Sequential classes also fire the backup transport on its own when it is
//! not part of the chain. Within a transport, credentials are tried in
//! registration order and down credentials are skipped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use parley_config::model::FallbackConfig;
use parley_core::traits::channel::ChannelAdapter;
use parley_core::types::{DeliveryChannel, HealthStatus, OutboundMessage, PriorityClass};
use parley_storage::queries::comm_logs;
use parley_storage::{now_timestamp, ChannelAttempt, CommunicationLog, Database};

use crate::health::{ChannelHealth, CredentialKey, HealthRegistry, HealthState};

type ClockFn = Arc<dyn Fn() -> Instant + Send + Sync>;

/// Addresses of one recipient across transports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recipient {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub push_id: Option<String>,
}

impl Recipient {
    pub fn phone(phone: impl Into<String>) -> Self {
        Self {
            phone: Some(phone.into()),
            ..Self::default()
        }
    }

    pub fn address_for(&self, channel: DeliveryChannel) -> Option<&str> {
        match channel {
            DeliveryChannel::Whatsapp | DeliveryChannel::Sms => self.phone.as_deref(),
            DeliveryChannel::Email => self.email.as_deref(),
            DeliveryChannel::Push => self.push_id.as_deref(),
        }
    }

    /// The first address on file, used as the audit key.
    pub fn display(&self) -> String {
        self.phone
            .as_deref()
            .or(self.email.as_deref())
            .or(self.push_id.as_deref())
            .unwrap_or("unknown")
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationRequest {
    pub recipient: Recipient,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
    pub priority: PriorityClass,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunicationResult {
    pub success: bool,
    pub channel_used: Option<DeliveryChannel>,
    pub message_id: Option<String>,
    pub attempts: Vec<ChannelAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Transport order for a priority class, and whether it fans out.
pub fn chain_for(priority: PriorityClass) -> (&'static [DeliveryChannel], bool) {
    use DeliveryChannel::{Email, Push, Sms, Whatsapp};
    match priority {
        PriorityClass::Instant => (&[Whatsapp, Sms, Push], false),
        PriorityClass::Informational => (&[Whatsapp, Email, Push], false),
        PriorityClass::Transactional => (&[Email, Whatsapp], true),
        PriorityClass::Critical => (&[Whatsapp, Sms, Push, Email], true),
    }
}

struct Credential {
    key: CredentialKey,
    adapter: Arc<dyn ChannelAdapter>,
}

/// Outcome of trying one transport.
struct ChannelRun {
    attempts: Vec<ChannelAttempt>,
    delivered: Option<(DeliveryChannel, String)>,
}

pub struct FallbackRouter {
    db: Database,
    credentials: RwLock<Vec<Credential>>,
    health: Arc<HealthRegistry>,
    backup_channel: Option<DeliveryChannel>,
    alert_phone: Option<String>,
    alert_email: Option<String>,
    alert_cooldown: Duration,
    last_alert: Mutex<HashMap<CredentialKey, Instant>>,
    clock: ClockFn,
}

impl FallbackRouter {
    pub fn new(db: Database, health: Arc<HealthRegistry>, config: &FallbackConfig) -> Self {
        let backup_channel = config.backup_channel.parse::<DeliveryChannel>().ok();
        if backup_channel.is_none() {
            warn!(backup_channel = %config.backup_channel, "unknown backup channel, backup disabled");
        }
        Self {
            db,
            credentials: RwLock::new(Vec::new()),
            health,
            backup_channel,
            alert_phone: config.alert_phone.clone(),
            alert_email: config.alert_email.clone(),
            alert_cooldown: Duration::from_secs(config.alert_cooldown_secs),
            last_alert: Mutex::new(HashMap::new()),
            clock: Arc::new(Instant::now),
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: ClockFn) -> Self {
        self.clock = clock;
        self
    }

    /// Register a send credential. Credentials of one transport are tried
    /// in the order they were added.
    pub fn add_credential(&self, label: impl Into<String>, adapter: Arc<dyn ChannelAdapter>) {
        let key = CredentialKey::new(adapter.channel(), label);
        self.health.register(key.clone());
        let mut credentials = match self.credentials.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if credentials.iter().any(|c| c.key == key) {
            warn!(credential = %key, "credential already registered");
            return;
        }
        info!(credential = %key, "credential registered");
        credentials.push(Credential { key, adapter });
    }

    pub fn health(&self) -> &Arc<HealthRegistry> {
        &self.health
    }

    pub fn channel_health(&self) -> Vec<ChannelHealth> {
        self.health.snapshot()
    }

    pub fn reset_channel_health(&self, channel: Option<DeliveryChannel>) -> usize {
        self.health.reset(channel)
    }

    /// Transports with at least one registered credential.
    pub fn configured_channels(&self) -> Vec<DeliveryChannel> {
        let mut kinds: Vec<DeliveryChannel> =
            self.credentials_snapshot().iter().map(|(k, _)| k.channel).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    fn credentials_snapshot(&self) -> Vec<(CredentialKey, Arc<dyn ChannelAdapter>)> {
        let credentials = match self.credentials.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        credentials
            .iter()
            .map(|c| (c.key.clone(), c.adapter.clone()))
            .collect()
    }

    fn credentials_for(&self, channel: DeliveryChannel) -> Vec<(CredentialKey, Arc<dyn ChannelAdapter>)> {
        self.credentials_snapshot()
            .into_iter()
            .filter(|(k, _)| k.channel == channel)
            .collect()
    }

    /// Probe every credential and update its record.
    pub async fn run_health_check(&self) -> Vec<ChannelHealth> {
        for (key, adapter) in self.credentials_snapshot() {
            let (state, error) = match adapter.health_check().await {
                Ok(HealthStatus::Healthy) => (HealthState::Healthy, None),
                Ok(HealthStatus::Degraded(reason)) => (HealthState::Degraded, Some(reason)),
                Ok(HealthStatus::Unhealthy(reason)) => (HealthState::Down, Some(reason)),
                Err(e) => (HealthState::Down, Some(e.to_string())),
            };
            debug!(credential = %key, status = %state, "health probe");
            self.health.set_probe_result(&key, state, error);
        }
        self.health.snapshot()
    }

    /// Probe credentials every `interval` until `cancel` fires.
    pub async fn run_periodic_health_check(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = self.run_health_check().await;
                    let down = snapshot.iter().filter(|h| h.status == HealthState::Down).count();
                    debug!(credentials = snapshot.len(), down, "periodic health check");
                }
                () = cancel.cancelled() => break,
            }
        }
    }

    pub async fn send(&self, request: &CommunicationRequest) -> CommunicationResult {
        let (base, parallel) = chain_for(request.priority);
        let mut chain = base.to_vec();
        if request.priority == PriorityClass::Critical {
            for kind in self.configured_channels() {
                if !chain.contains(&kind) {
                    chain.push(kind);
                }
            }
        }

        let (runs, backup) = if parallel {
            let runs = join_all(chain.iter().map(|kind| self.try_channel(*kind, request))).await;
            (runs, None)
        } else {
            match self.backup_channel.filter(|b| !chain.contains(b)) {
                Some(backup) => {
                    let (runs, backup_run) = tokio::join!(
                        self.run_sequential(&chain, request),
                        self.try_channel(backup, request)
                    );
                    (runs, Some(backup_run))
                }
                None => (self.run_sequential(&chain, request).await, None),
            }
        };

        let delivered = runs.iter().find_map(|r| r.delivered.clone());
        let mut attempts: Vec<ChannelAttempt> = runs.into_iter().flat_map(|r| r.attempts).collect();
        if let Some(backup) = backup {
            attempts.extend(backup.attempts);
        }

        let error = if delivered.is_some() {
            None
        } else {
            Some(aggregate_error(&attempts))
        };
        let result = CommunicationResult {
            success: delivered.is_some(),
            channel_used: delivered.as_ref().map(|(kind, _)| *kind),
            message_id: delivered.map(|(_, id)| id),
            attempts,
            error,
        };

        match &result.error {
            None => info!(
                recipient = %request.recipient.display(),
                priority = %request.priority,
                channel = ?result.channel_used,
                "communication delivered"
            ),
            Some(e) => error!(
                recipient = %request.recipient.display(),
                priority = %request.priority,
                error = %e,
                "communication failed"
            ),
        }
        self.audit(request, &result).await;
        result
    }

    async fn run_sequential(
        &self,
        chain: &[DeliveryChannel],
        request: &CommunicationRequest,
    ) -> Vec<ChannelRun> {
        let mut runs = Vec::new();
        for kind in chain {
            let run = self.try_channel(*kind, request).await;
            let done = run.delivered.is_some();
            runs.push(run);
            if done {
                break;
            }
        }
        runs
    }

    async fn try_channel(&self, channel: DeliveryChannel, request: &CommunicationRequest) -> ChannelRun {
        let mut run = ChannelRun {
            attempts: Vec::new(),
            delivered: None,
        };
        let Some(address) = request.recipient.address_for(channel) else {
            debug!(%channel, "recipient has no address for channel");
            return run;
        };

        for (key, adapter) in self.credentials_for(channel) {
            if self.health.is_down(&key) {
                debug!(credential = %key, "credential down, skipped");
                continue;
            }
            let outbound = OutboundMessage {
                recipient: address.to_string(),
                subject: request.subject.clone(),
                body: request.body.clone(),
                credential: None,
            };
            match adapter.send(outbound).await {
                Ok(id) => {
                    self.health.record_success(&key);
                    run.attempts.push(ChannelAttempt {
                        channel,
                        credential: key.label.clone(),
                        success: true,
                        message_id: Some(id.0.clone()),
                        error: None,
                    });
                    run.delivered = Some((channel, id.0));
                    return run;
                }
                Err(e) => {
                    let error = e.to_string();
                    warn!(credential = %key, error = %error, "channel attempt failed");
                    if self.health.record_failure(&key, &error) {
                        self.alert_down(&key, &error).await;
                    }
                    run.attempts.push(ChannelAttempt {
                        channel,
                        credential: key.label.clone(),
                        success: false,
                        message_id: None,
                        error: Some(error),
                    });
                }
            }
        }
        run
    }

    /// Tell the admin a credential went down, at most once per cooldown.
    async fn alert_down(&self, key: &CredentialKey, error: &str) {
        let now = (self.clock)();
        {
            let mut last = match self.last_alert.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(at) = last.get(key)
                && now.saturating_duration_since(*at) < self.alert_cooldown
            {
                debug!(credential = %key, "alert suppressed by cooldown");
                return;
            }
            last.insert(key.clone(), now);
        }

        let body = format!("[parley] channel {key} is down after repeated failures: {error}");
        let targets = [
            (DeliveryChannel::Whatsapp, self.alert_phone.as_deref()),
            (DeliveryChannel::Email, self.alert_email.as_deref()),
        ];
        for (channel, address) in targets {
            let Some(address) = address else { continue };
            let candidate = self
                .credentials_for(channel)
                .into_iter()
                .find(|(k, _)| k != key && !self.health.is_down(k));
            let Some((alert_key, adapter)) = candidate else {
                continue;
            };
            let mut msg = OutboundMessage::new(address, body.clone());
            msg.subject = Some("Channel down".to_string());
            match adapter.send(msg).await {
                Ok(_) => info!(credential = %key, via = %alert_key, "admin alerted"),
                Err(e) => warn!(credential = %key, via = %alert_key, error = %e, "admin alert failed"),
            }
        }
    }

    async fn audit(&self, request: &CommunicationRequest, result: &CommunicationResult) {
        let mut channels_attempted: Vec<DeliveryChannel> = Vec::new();
        for attempt in &result.attempts {
            if !channels_attempted.contains(&attempt.channel) {
                channels_attempted.push(attempt.channel);
            }
        }
        let log = CommunicationLog {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: request.client_id.clone(),
            conversation_id: request.conversation_id.clone(),
            recipient: request.recipient.display(),
            priority: request.priority,
            channels_attempted,
            channel_used: result.channel_used,
            success: result.success,
            results: result.attempts.clone(),
            created_at: now_timestamp(),
        };
        if let Err(e) = comm_logs::insert_communication_log(&self.db, &log).await {
            warn!(error = %e, "failed to write communication log (non-fatal)");
        }
    }
}

/// `All channels failed: whatsapp: <err>, sms: <err>`.
fn aggregate_error(attempts: &[ChannelAttempt]) -> String {
    let failures: Vec<String> = attempts
        .iter()
        .filter(|a| !a.success)
        .map(|a| format!("{}: {}", a.channel, a.error.as_deref().unwrap_or("unknown error")))
        .collect();
    if failures.is_empty() {
        "All channels failed: no channel available".to_string()
    } else {
        format!("All channels failed: {}", failures.join(", "))
    }
}
