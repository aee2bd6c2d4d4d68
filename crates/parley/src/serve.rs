// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley serve` command implementation.
//!
//! Opens storage, builds the configured channel adapters, assembles the
//! conversation engine and the fallback router, then runs the background
//! worker, the periodic health check and the HTTP gateway until a shutdown
//! signal arrives.

use std::sync::Arc;
use std::time::Duration;

use parley_config::model::ParleyConfig;
use parley_core::traits::{ChannelAdapter, PluginAdapter};
use parley_core::types::DeliveryChannel;
use parley_core::ParleyError;
use parley_email::EmailChannel;
use parley_gateway::GatewayState;
use parley_pipeline::{build_responder, shutdown, Collaborators, Dispatcher, Engine};
use parley_push::PushChannel;
use parley_resilience::{BulkDispatcher, FallbackRouter, HealthRegistry};
use parley_sms::SmsChannel;
use parley_storage::Database;
use parley_whatsapp::WhatsAppChannel;
use tracing::{error, info, warn};

/// How long shutdown waits for each draining task.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// A send credential: its label and the adapter behind it.
pub(crate) struct Transport {
    pub label: String,
    pub adapter: Arc<dyn ChannelAdapter>,
}

/// Build every adapter the configuration enables, primary accounts first.
pub(crate) fn build_transports(config: &ParleyConfig) -> Result<Vec<Transport>, ParleyError> {
    let timeout = Duration::from_secs(config.dispatch.request_timeout_secs);
    let mut transports = Vec::new();

    for (label, channel) in WhatsAppChannel::from_config(&config.whatsapp, &config.identity, timeout)? {
        transports.push(Transport {
            label,
            adapter: Arc::new(channel),
        });
    }
    if let Some(email) = EmailChannel::from_config(&config.email, timeout)? {
        transports.push(Transport {
            label: "smtp".to_string(),
            adapter: Arc::new(email),
        });
    }
    if let Some(sms) = SmsChannel::from_config(&config.sms, &config.identity, timeout)? {
        transports.push(Transport {
            label: "twilio".to_string(),
            adapter: Arc::new(sms),
        });
    }
    if let Some(push) = PushChannel::from_config(&config.push, &config.service.name, timeout)? {
        transports.push(Transport {
            label: "onesignal".to_string(),
            adapter: Arc::new(push),
        });
    }
    Ok(transports)
}

/// The conversation dispatcher gets the first credential of each kind.
fn build_dispatcher(db: &Database, config: &ParleyConfig, transports: &[Transport]) -> Dispatcher {
    let mut dispatcher = Dispatcher::new(db.clone(), &config.dispatch);
    let mut registered: Vec<DeliveryChannel> = Vec::new();
    for transport in transports {
        let kind = transport.adapter.channel();
        if !registered.contains(&kind) {
            dispatcher.register(transport.adapter.clone());
            registered.push(kind);
        }
    }
    if !registered.contains(&DeliveryChannel::Whatsapp) {
        warn!("no whatsapp account configured, conversation replies on WA will fail");
    }
    dispatcher
}

/// Runs the `parley serve` command.
pub async fn run_serve(config: ParleyConfig) -> Result<(), ParleyError> {
    info!(service = %config.service.name, "starting parley serve");

    let db = Database::open(&config.storage.database_path).await?;
    info!(path = %config.storage.database_path, "storage opened");

    let transports = build_transports(&config)?;
    for transport in &transports {
        info!(
            channel = %transport.adapter.channel(),
            label = %transport.label,
            adapter = transport.adapter.name(),
            "channel adapter ready"
        );
    }

    let dispatcher = build_dispatcher(&db, &config, &transports);
    let collaborators = Collaborators {
        responder: build_responder(&config.responder)?,
        ..Collaborators::default()
    };
    let (engine, worker) = Engine::build(db.clone(), &config, dispatcher, collaborators)?;

    let health = Arc::new(HealthRegistry::new(
        config.fallback.degraded_after,
        config.fallback.down_after,
    ));
    let fallback = Arc::new(FallbackRouter::new(db.clone(), health, &config.fallback));
    for transport in &transports {
        fallback.add_credential(transport.label.clone(), transport.adapter.clone());
    }
    let bulk = Arc::new(BulkDispatcher::new(fallback.clone(), &config.bulk));

    let cancel = shutdown::install_signal_handler();

    let worker_task = tokio::spawn(worker.run(cancel.clone()));

    let health_task = if config.fallback.health_check_interval_secs > 0 {
        let interval = Duration::from_secs(config.fallback.health_check_interval_secs);
        Some(tokio::spawn(
            fallback.clone().run_periodic_health_check(interval, cancel.clone()),
        ))
    } else {
        info!("periodic channel health check disabled");
        None
    };

    let gateway_task = if config.gateway.enabled {
        let gateway_config = config.gateway.clone();
        let state = GatewayState::new(
            engine.clone(),
            fallback.clone(),
            bulk.clone(),
            config.gateway.bearer_token.clone(),
        );
        let gateway_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            let result =
                parley_gateway::start_server(&gateway_config, state, gateway_cancel.clone()).await;
            if result.is_err() {
                // Nothing left to serve; bring the rest down with it.
                gateway_cancel.cancel();
            }
            result
        }))
    } else {
        info!("gateway disabled");
        None
    };

    info!("parley serve ready");
    cancel.cancelled().await;
    info!("shutting down");

    let mut outcome = Ok(());
    if let Some(task) = gateway_task {
        match task.await {
            Ok(Err(e)) => {
                error!(error = %e, "gateway stopped with an error");
                outcome = Err(e);
            }
            Err(e) => error!(error = %e, "gateway task panicked"),
            Ok(Ok(())) => {}
        }
    }
    if let Some(task) = health_task {
        shutdown::drain("health-check", task, DRAIN_TIMEOUT).await;
    }
    shutdown::drain("worker", worker_task, DRAIN_TIMEOUT).await;

    for transport in &transports {
        if let Err(e) = transport.adapter.shutdown().await {
            warn!(label = %transport.label, error = %e, "adapter shutdown failed");
        }
    }
    db.close().await?;

    info!("parley serve shutdown complete");
    outcome
}
