// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the complete engine with mock transports and
//! collaborators on a temp SQLite database: ingestion pipeline, dispatcher,
//! background worker, fallback router and bulk dispatcher.

use std::sync::Arc;

use parley_config::model::ParleyConfig;
use parley_core::traits::ChannelAdapter;
use parley_core::types::{Channel, ColumnConfig, ColumnMode, DeliveryChannel};
use parley_core::ParleyError;
use parley_pipeline::{Collaborators, Dispatcher, Engine, InboundEvent, IngestOutcome, ProviderMeta};
use parley_resilience::{BulkDispatcher, FallbackRouter, HealthRegistry};
use parley_storage::queries::columns;
use parley_storage::{Database, NewColumn};
use tokio_util::sync::CancellationToken;

use crate::mock_channel::MockChannel;
use crate::mock_responder::{MockContactDirectory, MockFactExtractor, MockResponder};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    reply: Option<String>,
    column_mode: ColumnMode,
    config: ParleyConfig,
    extra_transports: Vec<DeliveryChannel>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = ParleyConfig::default();
        config.dispatch.retry_delay_ms = 1;
        config.dispatch.status_retry_delay_ms = 1;
        config.worker.retry_delay_ms = 1;
        config.bulk.min_delay_ms = 0;
        config.bulk.max_delay_ms = 0;
        config.bulk.batch_pause_min_ms = 0;
        config.bulk.batch_pause_max_ms = 0;
        Self {
            reply: None,
            column_mode: ColumnMode::Ai,
            config,
            extra_transports: Vec::new(),
        }
    }

    /// Reply the mock responder gives to every gated message.
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    /// Mode of the default bucket new conversations land in.
    pub fn with_column_mode(mut self, mode: ColumnMode) -> Self {
        self.column_mode = mode;
        self
    }

    pub fn with_dispatch_attempts(mut self, max_attempts: u32) -> Self {
        self.config.dispatch.max_attempts = max_attempts;
        self
    }

    pub fn with_hourly_cap(mut self, max_per_hour: u32) -> Self {
        self.config.bulk.max_per_hour = max_per_hour;
        self
    }

    /// Register mock SMS/push transports on the fallback router as well.
    pub fn with_transport(mut self, channel: DeliveryChannel) -> Self {
        self.extra_transports.push(channel);
        self
    }

    pub fn with_config(mut self, edit: impl FnOnce(&mut ParleyConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Build the test harness and start its background worker.
    pub async fn build(self) -> Result<TestHarness, ParleyError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| ParleyError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");
        let mut config = self.config;
        config.storage.database_path = db_path.to_string_lossy().to_string();

        let db = Database::open(&config.storage.database_path).await?;
        columns::insert_column(
            &db,
            &NewColumn {
                name: "Inbox".to_string(),
                position: 0,
                mode: self.column_mode,
                config: ColumnConfig::default(),
            },
        )
        .await?;

        let whatsapp = Arc::new(MockChannel::new(DeliveryChannel::Whatsapp));
        let email = Arc::new(MockChannel::new(DeliveryChannel::Email));
        let responder = Arc::new(match self.reply {
            Some(reply) => MockResponder::replying(reply),
            None => MockResponder::silent(),
        });
        let facts = Arc::new(MockFactExtractor::empty());
        let contacts = Arc::new(MockContactDirectory::new());

        let dispatcher = Dispatcher::new(db.clone(), &config.dispatch)
            .with_adapter(whatsapp.clone())
            .with_adapter(email.clone());
        let (engine, worker) = Engine::build(
            db.clone(),
            &config,
            dispatcher,
            Collaborators {
                responder: responder.clone(),
                facts: Some(facts.clone()),
                contacts: Some(contacts.clone()),
            },
        )?;
        let cancel = CancellationToken::new();
        tokio::spawn(worker.run(cancel.clone()));

        let health = Arc::new(HealthRegistry::new(
            config.fallback.degraded_after,
            config.fallback.down_after,
        ));
        let fallback = Arc::new(FallbackRouter::new(db.clone(), health, &config.fallback));
        fallback.add_credential("primary", whatsapp.clone());
        fallback.add_credential("smtp", email.clone());
        let mut transports = Vec::new();
        for channel in self.extra_transports {
            let mock = Arc::new(MockChannel::new(channel));
            fallback.add_credential("mock", mock.clone());
            transports.push(mock);
        }
        let bulk = Arc::new(BulkDispatcher::new(fallback.clone(), &config.bulk));

        Ok(TestHarness {
            db,
            config,
            engine,
            fallback,
            bulk,
            whatsapp,
            email,
            transports,
            responder,
            facts,
            contacts,
            cancel,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    /// Temp database, removed on drop.
    pub db: Database,
    pub config: ParleyConfig,
    pub engine: Engine,
    pub fallback: Arc<FallbackRouter>,
    pub bulk: Arc<BulkDispatcher>,
    /// WhatsApp transport, used by the dispatcher and the fallback router.
    pub whatsapp: Arc<MockChannel>,
    pub email: Arc<MockChannel>,
    /// Transports added with [`TestHarnessBuilder::with_transport`].
    pub transports: Vec<Arc<MockChannel>>,
    pub responder: Arc<MockResponder>,
    pub facts: Arc<MockFactExtractor>,
    pub contacts: Arc<MockContactDirectory>,
    cancel: CancellationToken,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Ingest an inbound WhatsApp text from `handle`.
    pub async fn receive(
        &self,
        handle: &str,
        content: &str,
        provider_id: Option<&str>,
    ) -> Result<IngestOutcome, ParleyError> {
        self.engine
            .ingest
            .ingest(InboundEvent {
                channel: Channel::Wa,
                handle: handle.to_string(),
                content: content.to_string(),
                meta: ProviderMeta {
                    id: provider_id.map(str::to_string),
                    ..ProviderMeta::default()
                },
            })
            .await
    }

    /// Wait until every queued background job has finished.
    pub async fn settle(&self) {
        self.engine.worker.wait_idle().await;
    }

    /// Transport added with [`TestHarnessBuilder::with_transport`].
    pub fn transport(&self, channel: DeliveryChannel) -> Option<&Arc<MockChannel>> {
        self.transports.iter().find(|t| t.channel() == channel)
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
