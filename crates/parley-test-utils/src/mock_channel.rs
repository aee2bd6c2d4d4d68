// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` captures every successful send and can be scripted to fail
//! a number of times, or always, so retry and fallback paths are observable.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use parley_core::traits::adapter::PluginAdapter;
use parley_core::traits::channel::ChannelAdapter;
use parley_core::types::{DeliveryChannel, HealthStatus, MessageId, OutboundMessage};
use parley_core::ParleyError;

/// A mock delivery channel.
///
/// Outcomes are taken from the script first; once it is empty every send
/// succeeds unless the channel was switched to always fail.
pub struct MockChannel {
    name: String,
    channel: DeliveryChannel,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    script: Mutex<VecDeque<bool>>,
    always_fail: AtomicBool,
    attempts: AtomicUsize,
    health: Mutex<HealthStatus>,
}

impl MockChannel {
    pub fn new(channel: DeliveryChannel) -> Self {
        Self::named(format!("mock-{channel}"), channel)
    }

    pub fn named(name: impl Into<String>, channel: DeliveryChannel) -> Self {
        Self {
            name: name.into(),
            channel,
            sent: Arc::new(Mutex::new(Vec::new())),
            script: Mutex::new(VecDeque::new()),
            always_fail: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
            health: Mutex::new(HealthStatus::Healthy),
        }
    }

    /// A channel whose every send fails.
    pub fn failing(channel: DeliveryChannel) -> Self {
        let mock = Self::new(channel);
        mock.set_failing(true);
        mock
    }

    pub fn set_failing(&self, failing: bool) {
        self.always_fail.store(failing, Ordering::SeqCst);
    }

    /// Fail the next `n` sends, then fall back to the default behaviour.
    pub async fn fail_next(&self, n: usize) {
        self.script.lock().await.extend(std::iter::repeat_n(false, n));
    }

    pub async fn set_health(&self, status: HealthStatus) {
        *self.health.lock().await = status;
    }

    /// Number of `send()` calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Messages that were accepted.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(self.health.lock().await.clone())
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    fn channel(&self) -> DeliveryChannel {
        self.channel
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, ParleyError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let succeed = match self.script.lock().await.pop_front() {
            Some(scripted) => scripted,
            None => !self.always_fail.load(Ordering::SeqCst),
        };
        if !succeed {
            return Err(ParleyError::channel(format!(
                "{}: simulated failure on attempt {n}",
                self.name
            )));
        }
        self.sent.lock().await.push(msg);
        Ok(MessageId(format!("{}-{n}", self.name)))
    }
}
