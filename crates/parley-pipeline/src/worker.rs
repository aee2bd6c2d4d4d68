// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Supervised background worker.
//!
//! Work that must not hold up ingestion (contact snapshot refresh, fact
//! sync, outbound dispatch) is submitted as a typed [`BackgroundJob`] to a
//! bounded queue. Each job runs in its own task with a bounded retry count;
//! terminal failures are logged and counted. On cancellation the queue is
//! drained and in-flight jobs are awaited.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use parley_config::model::WorkerConfig;
use parley_core::traits::collaborator::{ContactDirectory, FactExtractor};
use parley_core::types::{Channel, ContactSnapshot, MessageType};
use parley_core::ParleyError;
use parley_storage::queries::{contacts, conversations, messages};
use parley_storage::{now_timestamp, Database};

use crate::dispatcher::{DispatchOutcome, Dispatcher};

/// Lifetime value above which a contact is flagged as VIP.
const VIP_LIFETIME_VALUE: f64 = 5000.0;

#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundJob {
    RefreshContact {
        channel: Channel,
        handle: String,
    },
    SyncFacts {
        conversation_id: String,
    },
    Dispatch {
        conversation_id: String,
        message_id: String,
        content: String,
        message_type: MessageType,
    },
}

impl BackgroundJob {
    pub fn kind(&self) -> &'static str {
        match self {
            BackgroundJob::RefreshContact { .. } => "refresh_contact",
            BackgroundJob::SyncFacts { .. } => "sync_facts",
            BackgroundJob::Dispatch { .. } => "dispatch",
        }
    }

    /// Dispatch retries inside the dispatcher; retrying the job would resend.
    fn retryable(&self) -> bool {
        !matches!(self, BackgroundJob::Dispatch { .. })
    }
}

/// Executes jobs against storage and the external collaborators.
pub struct JobRunner {
    db: Database,
    dispatcher: Arc<Dispatcher>,
    facts: Option<Arc<dyn FactExtractor>>,
    contacts: Option<Arc<dyn ContactDirectory>>,
    history_limit: usize,
}

impl JobRunner {
    pub fn new(
        db: Database,
        dispatcher: Arc<Dispatcher>,
        facts: Option<Arc<dyn FactExtractor>>,
        contacts: Option<Arc<dyn ContactDirectory>>,
        history_limit: usize,
    ) -> Self {
        Self {
            db,
            dispatcher,
            facts,
            contacts,
            history_limit,
        }
    }

    pub async fn run(&self, job: &BackgroundJob) -> Result<(), ParleyError> {
        match job {
            BackgroundJob::RefreshContact { channel, handle } => {
                self.refresh_contact(*channel, handle).await
            }
            BackgroundJob::SyncFacts { conversation_id } => self.sync_facts(conversation_id).await,
            BackgroundJob::Dispatch {
                conversation_id,
                message_id,
                content,
                message_type,
            } => {
                let outcome = self
                    .dispatcher
                    .send(conversation_id, message_id, content, *message_type)
                    .await?;
                if let DispatchOutcome::Failed { error, .. } = outcome {
                    return Err(ParleyError::channel(error));
                }
                Ok(())
            }
        }
    }

    async fn refresh_contact(&self, channel: Channel, handle: &str) -> Result<(), ParleyError> {
        let Some(directory) = &self.contacts else {
            return Ok(());
        };
        let Some(profile) = directory.lookup(channel, handle).await? else {
            debug!(%channel, handle, "contact not in directory");
            return Ok(());
        };
        let risk_level = if profile.lifetime_value > VIP_LIFETIME_VALUE {
            "vip"
        } else {
            "low"
        };
        contacts::upsert_contact_snapshot(
            &self.db,
            &ContactSnapshot {
                handle: handle.to_string(),
                channel,
                name: profile.name,
                avatar_url: profile.avatar_url,
                lifetime_value: profile.lifetime_value,
                risk_level: risk_level.to_string(),
                updated_at: now_timestamp(),
            },
        )
        .await
    }

    async fn sync_facts(&self, conversation_id: &str) -> Result<(), ParleyError> {
        let Some(extractor) = &self.facts else {
            return Ok(());
        };
        let Some(conversation) = conversations::get_conversation(&self.db, conversation_id).await?
        else {
            debug!(conversation_id, "conversation gone before fact sync");
            return Ok(());
        };
        let transcript = messages::recent_messages(&self.db, conversation_id, self.history_limit).await?;
        if let Some(facts) = extractor.extract(&conversation, &transcript).await? {
            conversations::update_facts(&self.db, conversation_id, &facts).await?;
            debug!(conversation_id, "facts synced");
        }
        Ok(())
    }
}

/// Counters exposed by [`WorkerHandle::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub completed: u64,
    pub failed: u64,
    pub pending: usize,
}

#[derive(Default)]
struct Shared {
    completed: AtomicU64,
    failed: AtomicU64,
    pending: AtomicUsize,
    idle: Notify,
}

impl Shared {
    fn finish(&self, ok: bool) {
        if ok {
            self.completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Cloneable submission side of the worker.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<BackgroundJob>,
    shared: Arc<Shared>,
}

impl WorkerHandle {
    /// Queue a job, waiting for capacity when the queue is full.
    pub async fn submit(&self, job: BackgroundJob) -> Result<(), ParleyError> {
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.tx.send(job).await {
            self.shared.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(ParleyError::Internal(format!(
                "background worker stopped, dropped {} job",
                e.0.kind()
            )));
        }
        Ok(())
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            completed: self.shared.completed.load(Ordering::SeqCst),
            failed: self.shared.failed.load(Ordering::SeqCst),
            pending: self.shared.pending.load(Ordering::SeqCst),
        }
    }

    /// Resolves once every submitted job has finished, including jobs
    /// submitted by jobs.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.shared.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

pub struct BackgroundWorker {
    rx: mpsc::Receiver<BackgroundJob>,
    runner: Arc<JobRunner>,
    shared: Arc<Shared>,
    tracker: TaskTracker,
    max_attempts: u32,
    retry_delay: Duration,
}

impl BackgroundWorker {
    pub fn new(runner: JobRunner, config: &WorkerConfig) -> (Self, WorkerHandle) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let shared = Arc::new(Shared::default());
        let worker = Self {
            rx,
            runner: Arc::new(runner),
            shared: shared.clone(),
            tracker: TaskTracker::new(),
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        };
        (worker, WorkerHandle { tx, shared })
    }

    /// Run until `cancel` fires, then drain queued and in-flight jobs.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("background worker started");
        loop {
            tokio::select! {
                job = self.rx.recv() => match job {
                    Some(job) => self.spawn(job),
                    None => break,
                },
                () = cancel.cancelled() => break,
            }
        }

        self.rx.close();
        while let Some(job) = self.rx.recv().await {
            self.spawn(job);
        }
        self.tracker.close();
        self.tracker.wait().await;
        info!(
            completed = self.shared.completed.load(Ordering::SeqCst),
            failed = self.shared.failed.load(Ordering::SeqCst),
            "background worker stopped"
        );
    }

    fn spawn(&self, job: BackgroundJob) {
        let runner = self.runner.clone();
        let shared = self.shared.clone();
        let max_attempts = if job.retryable() { self.max_attempts } else { 1 };
        let retry_delay = self.retry_delay;

        self.tracker.spawn(async move {
            let mut attempt = 1;
            let ok = loop {
                match runner.run(&job).await {
                    Ok(()) => break true,
                    Err(e) if attempt < max_attempts => {
                        warn!(job = job.kind(), attempt, error = %e, "background job failed, retrying");
                        attempt += 1;
                        tokio::time::sleep(retry_delay).await;
                    }
                    Err(e) => {
                        error!(job = job.kind(), attempts = attempt, error = %e, "background job failed");
                        break false;
                    }
                }
            };
            shared.finish(ok);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_config::model::DispatchConfig;
    use parley_core::types::{ContactProfile, ConversationFacts};
    use parley_storage::NewConversation;
    use parley_test_utils::{MockContactDirectory, MockFactExtractor};

    fn worker_config() -> WorkerConfig {
        WorkerConfig {
            queue_capacity: 8,
            max_attempts: 3,
            retry_delay_ms: 1,
        }
    }

    fn start(runner: JobRunner) -> (WorkerHandle, CancellationToken, tokio::task::JoinHandle<()>) {
        let (worker, handle) = BackgroundWorker::new(runner, &worker_config());
        let cancel = CancellationToken::new();
        let join = tokio::spawn(worker.run(cancel.clone()));
        (handle, cancel, join)
    }

    fn dispatcher(db: &Database) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(db.clone(), &DispatchConfig::default()))
    }

    #[tokio::test]
    async fn contact_refresh_flags_vip() {
        let db = Database::open_in_memory().await.unwrap();
        let directory = Arc::new(MockContactDirectory::new().with_profile(
            "5512345678",
            ContactProfile {
                name: Some("Ana".to_string()),
                avatar_url: None,
                lifetime_value: 7200.0,
            },
        ));
        let runner = JobRunner::new(db.clone(), dispatcher(&db), None, Some(directory), 20);
        let (handle, cancel, join) = start(runner);

        handle
            .submit(BackgroundJob::RefreshContact {
                channel: Channel::Wa,
                handle: "5512345678".to_string(),
            })
            .await
            .unwrap();
        handle.wait_idle().await;

        let snapshot = contacts::get_contact_snapshot(&db, Channel::Wa, "5512345678")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.risk_level, "vip");
        assert_eq!(handle.stats().completed, 1);

        cancel.cancel();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn failing_job_is_retried_then_counted() {
        let db = Database::open_in_memory().await.unwrap();
        let directory = Arc::new(MockContactDirectory::new());
        directory.set_failing(true);
        let runner = JobRunner::new(db.clone(), dispatcher(&db), None, Some(directory.clone()), 20);
        let (handle, cancel, join) = start(runner);

        handle
            .submit(BackgroundJob::RefreshContact {
                channel: Channel::Wa,
                handle: "5512345678".to_string(),
            })
            .await
            .unwrap();
        handle.wait_idle().await;

        assert_eq!(directory.lookups(), 3);
        let stats = handle.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 0);

        cancel.cancel();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn fact_sync_stores_extracted_facts() {
        let db = Database::open_in_memory().await.unwrap();
        let conv = conversations::create_conversation(
            &db,
            &NewConversation {
                channel: Channel::Wa,
                handle: "5512345678".to_string(),
                column_id: None,
                agent_override_id: None,
                channel_binding_id: None,
                traffic_source: None,
            },
        )
        .await
        .unwrap();
        let facts = ConversationFacts {
            user_name: Some("Ana".to_string()),
            intent_score: Some(80),
            ..ConversationFacts::default()
        };
        let extractor = Arc::new(MockFactExtractor::returning(facts.clone()));
        let runner = JobRunner::new(db.clone(), dispatcher(&db), Some(extractor), None, 20);
        let (handle, cancel, join) = start(runner);

        handle
            .submit(BackgroundJob::SyncFacts {
                conversation_id: conv.id.clone(),
            })
            .await
            .unwrap();
        handle.wait_idle().await;

        let stored = conversations::get_conversation(&db, &conv.id).await.unwrap().unwrap();
        assert_eq!(stored.facts, facts);

        cancel.cancel();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_drains_queued_jobs() {
        let db = Database::open_in_memory().await.unwrap();
        let directory = Arc::new(MockContactDirectory::new());
        let runner = JobRunner::new(db.clone(), dispatcher(&db), None, Some(directory.clone()), 20);
        let (worker, handle) = BackgroundWorker::new(runner, &worker_config());

        for i in 0..4 {
            handle
                .submit(BackgroundJob::RefreshContact {
                    channel: Channel::Email,
                    handle: format!("user{i}@example.com"),
                })
                .await
                .unwrap();
        }
        let cancel = CancellationToken::new();
        cancel.cancel();
        worker.run(cancel).await;

        assert_eq!(directory.lookups(), 4);
        assert_eq!(handle.stats().completed, 4);
    }

    #[tokio::test]
    async fn submit_after_stop_is_an_error() {
        let db = Database::open_in_memory().await.unwrap();
        let runner = JobRunner::new(db.clone(), dispatcher(&db), None, None, 20);
        let (worker, handle) = BackgroundWorker::new(runner, &worker_config());
        drop(worker);

        let err = handle
            .submit(BackgroundJob::SyncFacts {
                conversation_id: "c".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::Internal(_)));
        assert_eq!(handle.stats().pending, 0);
    }
}
