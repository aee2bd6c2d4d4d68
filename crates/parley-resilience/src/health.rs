// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-credential channel health.
//!
//! Every dispatch credential has a record that counts consecutive failures.
//! The registry is an owned value handed to the routers that use it; it is
//! process-local and never persisted.

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use strum::Display;
use tracing::{info, warn};

use parley_core::types::DeliveryChannel;
use parley_storage::now_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Down,
}

/// One send credential: a transport plus the label of the account on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CredentialKey {
    pub channel: DeliveryChannel,
    pub label: String,
}

impl CredentialKey {
    pub fn new(channel: DeliveryChannel, label: impl Into<String>) -> Self {
        Self {
            channel,
            label: label.into(),
        }
    }
}

impl std::fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.channel, self.label)
    }
}

/// Snapshot of one credential's health record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelHealth {
    pub channel: DeliveryChannel,
    pub credential: String,
    pub status: HealthState,
    pub failure_count: u32,
    pub last_checked: Option<String>,
    pub last_error: Option<String>,
}

struct Record {
    key: CredentialKey,
    status: HealthState,
    failure_count: u32,
    last_checked: Option<String>,
    last_error: Option<String>,
}

impl Record {
    fn new(key: CredentialKey) -> Self {
        Self {
            key,
            status: HealthState::Healthy,
            failure_count: 0,
            last_checked: None,
            last_error: None,
        }
    }

    fn snapshot(&self) -> ChannelHealth {
        ChannelHealth {
            channel: self.key.channel,
            credential: self.key.label.clone(),
            status: self.status,
            failure_count: self.failure_count,
            last_checked: self.last_checked.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn restore(&mut self) {
        self.status = HealthState::Healthy;
        self.failure_count = 0;
        self.last_error = None;
        self.last_checked = Some(now_timestamp());
    }
}

/// Thresholds plus the records, in registration order.
pub struct HealthRegistry {
    records: Mutex<Vec<Record>>,
    degraded_after: u32,
    down_after: u32,
}

impl HealthRegistry {
    pub fn new(degraded_after: u32, down_after: u32) -> Self {
        let degraded_after = degraded_after.max(1);
        Self {
            records: Mutex::new(Vec::new()),
            degraded_after,
            down_after: down_after.max(degraded_after),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Start tracking a credential as healthy. Registering twice is a no-op.
    pub fn register(&self, key: CredentialKey) {
        let mut records = self.lock();
        if !records.iter().any(|r| r.key == key) {
            records.push(Record::new(key));
        }
    }

    pub fn is_down(&self, key: &CredentialKey) -> bool {
        self.lock()
            .iter()
            .any(|r| &r.key == key && r.status == HealthState::Down)
    }

    pub fn status(&self, key: &CredentialKey) -> Option<HealthState> {
        self.lock().iter().find(|r| &r.key == key).map(|r| r.status)
    }

    pub fn record_success(&self, key: &CredentialKey) {
        let mut records = self.lock();
        if let Some(record) = records.iter_mut().find(|r| &r.key == key) {
            if record.status != HealthState::Healthy {
                info!(credential = %key, "credential recovered");
            }
            record.restore();
        }
    }

    /// Count a failed attempt. Returns `true` when this failure took the
    /// credential down.
    pub fn record_failure(&self, key: &CredentialKey, error: &str) -> bool {
        let mut records = self.lock();
        let Some(record) = records.iter_mut().find(|r| &r.key == key) else {
            return false;
        };
        let was_down = record.status == HealthState::Down;
        record.failure_count = record.failure_count.saturating_add(1);
        record.last_error = Some(error.to_string());
        record.last_checked = Some(now_timestamp());
        record.status = if record.failure_count >= self.down_after {
            HealthState::Down
        } else if record.failure_count >= self.degraded_after {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };
        let went_down = !was_down && record.status == HealthState::Down;
        if went_down {
            warn!(credential = %key, failures = record.failure_count, "credential marked down");
        }
        went_down
    }

    /// Apply the result of an explicit health probe.
    pub fn set_probe_result(&self, key: &CredentialKey, status: HealthState, error: Option<String>) {
        let mut records = self.lock();
        let Some(record) = records.iter_mut().find(|r| &r.key == key) else {
            return;
        };
        match status {
            HealthState::Healthy => record.restore(),
            HealthState::Degraded => {
                record.status = HealthState::Degraded;
                record.failure_count = record.failure_count.max(self.degraded_after);
                record.last_error = error;
                record.last_checked = Some(now_timestamp());
            }
            HealthState::Down => {
                record.status = HealthState::Down;
                record.failure_count = record.failure_count.max(self.down_after);
                record.last_error = error;
                record.last_checked = Some(now_timestamp());
            }
        }
    }

    /// Mark credentials healthy again, all of them or one transport's.
    /// Returns how many records were reset.
    pub fn reset(&self, channel: Option<DeliveryChannel>) -> usize {
        let mut records = self.lock();
        let mut count = 0;
        for record in records
            .iter_mut()
            .filter(|r| channel.is_none_or(|c| r.key.channel == c))
        {
            record.restore();
            count += 1;
        }
        info!(channel = ?channel, count, "channel health reset");
        count
    }

    pub fn snapshot(&self) -> Vec<ChannelHealth> {
        self.lock().iter().map(Record::snapshot).collect()
    }
}
