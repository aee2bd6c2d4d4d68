// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingestion pipeline and conversation dispatch for Parley.
//!
//! The [`Engine`] ties together:
//! - [`IngestPipeline`]: resolve, dedup, echo-suppress, persist, rules, gate, reply
//! - [`ResponseGate`]: whether the automated responder may answer
//! - [`Dispatcher`]: bounded-retry delivery of outbound conversation messages
//! - [`BackgroundWorker`]: supervised queue for dispatch, fact sync and contact refresh
//! - [`ConversationAdmin`]: listing, moving, archiving and deleting conversations

pub mod admin;
pub mod dispatcher;
pub mod gate;
pub mod ingest;
pub mod responder;
pub mod shutdown;
pub mod worker;

use std::sync::Arc;

use parley_config::model::ParleyConfig;
use parley_core::traits::collaborator::{ContactDirectory, FactExtractor, Responder};
use parley_core::ParleyError;
use parley_router::{ChannelRouter, ConversationResolver};
use parley_rules::RuleEngine;
use parley_storage::Database;
use tracing::info;

pub use admin::ConversationAdmin;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use gate::{DenyReason, GateDecision, GateInput, ResponseGate, ResponsePlan};
pub use ingest::{Disposition, InboundEvent, IngestOutcome, IngestPipeline, ProviderMeta};
pub use responder::{build_responder, DisabledResponder, HttpResponder};
pub use worker::{BackgroundJob, BackgroundWorker, JobRunner, WorkerHandle, WorkerStats};

/// External collaborators the engine calls out to.
pub struct Collaborators {
    pub responder: Arc<dyn Responder>,
    pub facts: Option<Arc<dyn FactExtractor>>,
    pub contacts: Option<Arc<dyn ContactDirectory>>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            responder: Arc::new(DisabledResponder),
            facts: None,
            contacts: None,
        }
    }
}

/// The assembled conversation engine.
#[derive(Clone)]
pub struct Engine {
    pub ingest: IngestPipeline,
    pub dispatcher: Arc<Dispatcher>,
    pub admin: ConversationAdmin,
    pub worker: WorkerHandle,
}

impl Engine {
    /// Wire the engine over `db`.
    ///
    /// The returned worker must be driven with [`BackgroundWorker::run`];
    /// until then dispatch and background jobs only queue up.
    pub fn build(
        db: Database,
        config: &ParleyConfig,
        dispatcher: Dispatcher,
        collaborators: Collaborators,
    ) -> Result<(Self, BackgroundWorker), ParleyError> {
        let dispatcher = Arc::new(dispatcher);
        let runner = JobRunner::new(
            db.clone(),
            dispatcher.clone(),
            collaborators.facts,
            collaborators.contacts,
            config.ingest.history_limit,
        );
        let (worker, handle) = BackgroundWorker::new(runner, &config.worker);

        let resolver = ConversationResolver::new(db.clone(), ChannelRouter::new(db.clone()));
        let ingest = IngestPipeline::new(
            db.clone(),
            resolver,
            RuleEngine::new(db.clone()),
            Arc::new(ResponseGate::new(&config.gate)?),
            collaborators.responder,
            handle.clone(),
            config.ingest.clone(),
        );

        info!("conversation engine assembled");
        Ok((
            Self {
                ingest,
                dispatcher,
                admin: ConversationAdmin::new(db),
                worker: handle,
            },
            worker,
        ))
    }
}
