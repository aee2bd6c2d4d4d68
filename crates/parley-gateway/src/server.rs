// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use parley_config::model::GatewayConfig;
use parley_core::ParleyError;
use parley_pipeline::Engine;
use parley_resilience::{BulkDispatcher, FallbackRouter};

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;

/// Largest accepted request body; webhook batches stay well below this.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Engine,
    pub fallback: Arc<FallbackRouter>,
    pub bulk: Arc<BulkDispatcher>,
    pub auth: AuthConfig,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(
        engine: Engine,
        fallback: Arc<FallbackRouter>,
        bulk: Arc<BulkDispatcher>,
        bearer_token: Option<String>,
    ) -> Self {
        Self {
            engine,
            fallback,
            bulk,
            auth: AuthConfig { bearer_token },
            start_time: Instant::now(),
        }
    }
}

/// Build the gateway router.
///
/// `/health` is public; everything under `/v1` requires the bearer token.
pub fn router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/webhooks/inbound", post(handlers::post_webhook))
        .route("/v1/conversations", get(handlers::list_conversations))
        .route(
            "/v1/conversations/{id}",
            delete(handlers::delete_conversation),
        )
        .route(
            "/v1/conversations/{id}/messages",
            get(handlers::conversation_messages),
        )
        .route(
            "/v1/conversations/{id}/move",
            post(handlers::move_conversation),
        )
        .route(
            "/v1/conversations/{id}/archive",
            post(handlers::archive_conversation),
        )
        .route("/v1/columns", get(handlers::list_columns))
        .route("/v1/columns/{id}/config", put(handlers::update_column))
        .route("/v1/channels/health", get(handlers::channel_health))
        .route(
            "/v1/channels/health/check",
            post(handlers::run_health_check),
        )
        .route("/v1/channels/reset", post(handlers::reset_channels))
        .route("/v1/communications", post(handlers::send_communication))
        .route("/v1/communications/bulk", post(handlers::send_bulk))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the gateway until `cancel` fires.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), ParleyError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ParleyError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| ParleyError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway server stopped");
    Ok(())
}
