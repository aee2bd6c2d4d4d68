// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Paced bulk sending with an hourly cap.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use parley_config::model::BulkConfig;
use parley_core::types::PriorityClass;

use crate::fallback::{CommunicationRequest, FallbackRouter, Recipient};

const WINDOW: Duration = Duration::from_secs(60 * 60);

type ClockFn = Arc<dyn Fn() -> Instant + Send + Sync>;

struct WindowState {
    count: u32,
    resets_at: Instant,
}

/// Hourly send counter. Shared by reference so several dispatchers can
/// draw from one budget.
pub struct SendWindow {
    cap: u32,
    state: Mutex<WindowState>,
    clock: ClockFn,
}

impl SendWindow {
    pub fn new(cap: u32) -> Self {
        Self::with_clock(cap, Arc::new(Instant::now))
    }

    pub fn with_clock(cap: u32, clock: ClockFn) -> Self {
        let now = clock();
        Self {
            cap,
            state: Mutex::new(WindowState {
                count: 0,
                resets_at: now + WINDOW,
            }),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, WindowState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn roll(&self, state: &mut WindowState) {
        let now = (self.clock)();
        if now >= state.resets_at {
            state.count = 0;
            state.resets_at = now + WINDOW;
        }
    }

    /// Take one send from the budget. Returns `false` once the cap is hit.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        self.roll(&mut state);
        if state.count >= self.cap {
            return false;
        }
        state.count += 1;
        true
    }

    pub fn used(&self) -> u32 {
        let mut state = self.lock();
        self.roll(&mut state);
        state.count
    }

    pub fn remaining(&self) -> u32 {
        self.cap.saturating_sub(self.used())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRequest {
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
    #[serde(default = "default_bulk_priority")]
    pub priority: PriorityClass,
    #[serde(default)]
    pub client_id: Option<String>,
}

fn default_bulk_priority() -> PriorityClass {
    PriorityClass::Informational
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct BulkDispatcher {
    router: Arc<FallbackRouter>,
    window: Arc<SendWindow>,
    delay_ms: (u64, u64),
    batch_size: usize,
    batch_pause_ms: (u64, u64),
}

impl BulkDispatcher {
    pub fn new(router: Arc<FallbackRouter>, config: &BulkConfig) -> Self {
        Self {
            router,
            window: Arc::new(SendWindow::new(config.max_per_hour)),
            delay_ms: ordered(config.min_delay_ms, config.max_delay_ms),
            batch_size: config.batch_size.max(1),
            batch_pause_ms: ordered(config.batch_pause_min_ms, config.batch_pause_max_ms),
        }
    }

    /// Replace the hourly budget, e.g. with one shared across dispatchers.
    pub fn with_window(mut self, window: Arc<SendWindow>) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> &Arc<SendWindow> {
        &self.window
    }

    /// Send to every recipient in order, pausing between messages and
    /// between batches. Stops early once the hourly cap is reached; the
    /// rest are reported as skipped.
    pub async fn send(&self, request: &BulkRequest) -> BulkReport {
        let total = request.recipients.len();
        let mut report = BulkReport {
            total,
            ..BulkReport::default()
        };
        info!(total, "bulk send started");

        for (i, recipient) in request.recipients.iter().enumerate() {
            if !self.window.try_acquire() {
                report.skipped = total - i;
                warn!(skipped = report.skipped, "hourly send cap reached, bulk send stopped");
                break;
            }
            if i > 0 {
                let pause = if i % self.batch_size == 0 {
                    debug!(batch = i / self.batch_size, "batch pause");
                    self.batch_pause_ms
                } else {
                    self.delay_ms
                };
                tokio::time::sleep(jitter(pause)).await;
            }

            let result = self
                .router
                .send(&CommunicationRequest {
                    recipient: recipient.clone(),
                    subject: request.subject.clone(),
                    body: request.body.clone(),
                    priority: request.priority,
                    client_id: request.client_id.clone(),
                    conversation_id: None,
                })
                .await;
            if result.success {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
        }

        info!(
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            "bulk send complete"
        );
        report
    }
}

fn ordered(a: u64, b: u64) -> (u64, u64) {
    (a.min(b), a.max(b))
}

fn jitter((min, max): (u64, u64)) -> Duration {
    if max == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}
