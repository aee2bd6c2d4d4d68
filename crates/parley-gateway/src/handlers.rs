// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use parley_core::types::{
    Column, ColumnConfig, ColumnMode, Conversation, ConversationStatus, DeliveryChannel, Message,
};
use parley_core::ParleyError;
use parley_pipeline::WorkerStats;
use parley_resilience::{BulkReport, BulkRequest, ChannelHealth, CommunicationRequest};

use crate::server::GatewayState;
use crate::webhook::{parse_payload, WebhookPayload};

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Maps engine errors onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError(pub ParleyError);

impl From<ParleyError> for ApiError {
    fn from(e: ParleyError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ParleyError::NotFound { .. } => StatusCode::NOT_FOUND,
            ParleyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub worker: WorkerStats,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
        worker: state.engine.worker.stats(),
    })
}

/// POST /v1/webhooks/inbound
///
/// Messages are ingested in order and acknowledged once persisted; a
/// message with an unusable handle is skipped. Status batches are applied
/// in the background.
pub async fn post_webhook(State(state): State<GatewayState>, Json(body): Json<Value>) -> Response {
    let payload = match parse_payload(&body) {
        Ok(payload) => payload,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"success": false, "error": e.to_string()})),
            )
                .into_response();
        }
    };

    match payload {
        WebhookPayload::Statuses(updates) => {
            let updates: Vec<_> = updates
                .into_iter()
                .filter_map(|u| u.delivery_status().map(|s| (u.id, s)))
                .collect();
            let processed = updates.len();
            let dispatcher = state.engine.dispatcher.clone();
            tokio::spawn(async move {
                for (external_id, status) in updates {
                    if let Err(e) = dispatcher.update_status(&external_id, status).await {
                        tracing::warn!(external_id = %external_id, error = %e, "status update failed");
                    }
                }
            });
            Json(json!({"success": true, "processed_statuses": processed})).into_response()
        }
        WebhookPayload::Messages(events) => {
            let (mut processed, mut skipped) = (0, 0);
            for event in events {
                match state.engine.ingest.ingest(event).await {
                    Ok(_) => processed += 1,
                    Err(ParleyError::InvalidInput(reason)) => {
                        tracing::warn!(%reason, "skipping unprocessable webhook message");
                        skipped += 1;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "webhook ingestion failed");
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(json!({"success": false, "error": e.to_string()})),
                        )
                            .into_response();
                    }
                }
            }
            Json(json!({"success": true, "processed": processed, "skipped": skipped}))
                .into_response()
        }
        WebhookPayload::Legacy(event) => match state.engine.ingest.ingest(event).await {
            Ok(outcome) => Json(json!({
                "success": true,
                "message_id": outcome.message.id,
                "conversation_id": outcome.message.conversation_id,
            }))
            .into_response(),
            Err(e) => {
                tracing::error!(error = %e, "webhook ingestion failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"success": false, "error": e.to_string()})),
                )
                    .into_response()
            }
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<ConversationStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// GET /v1/conversations
pub async fn list_conversations(
    State(state): State<GatewayState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Conversation>>> {
    let limit = query.limit.clamp(1, 500);
    Ok(Json(
        state.engine.admin.list_conversations(query.status, limit).await?,
    ))
}

/// GET /v1/conversations/{id}/messages
pub async fn conversation_messages(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Message>>> {
    Ok(Json(state.engine.admin.messages(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub column_id: String,
}

/// POST /v1/conversations/{id}/move
pub async fn move_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<MoveRequest>,
) -> ApiResult<Json<Conversation>> {
    Ok(Json(
        state.engine.admin.move_to_column(&id, &body.column_id).await?,
    ))
}

/// POST /v1/conversations/{id}/archive
pub async fn archive_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Conversation>> {
    Ok(Json(state.engine.admin.archive(&id).await?))
}

/// DELETE /v1/conversations/{id}
pub async fn delete_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.engine.admin.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/columns
pub async fn list_columns(State(state): State<GatewayState>) -> ApiResult<Json<Vec<Column>>> {
    Ok(Json(state.engine.admin.list_columns().await?))
}

#[derive(Debug, Deserialize)]
pub struct ColumnUpdate {
    pub config: ColumnConfig,
    #[serde(default)]
    pub mode: Option<ColumnMode>,
}

/// PUT /v1/columns/{id}/config
pub async fn update_column(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<ColumnUpdate>,
) -> ApiResult<Json<Column>> {
    Ok(Json(
        state
            .engine
            .admin
            .update_column(&id, &body.config, body.mode)
            .await?,
    ))
}

/// GET /v1/channels/health
pub async fn channel_health(State(state): State<GatewayState>) -> Json<Vec<ChannelHealth>> {
    Json(state.fallback.channel_health())
}

/// POST /v1/channels/health/check
pub async fn run_health_check(State(state): State<GatewayState>) -> Json<Vec<ChannelHealth>> {
    Json(state.fallback.run_health_check().await)
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub channel: Option<DeliveryChannel>,
}

/// POST /v1/channels/reset
///
/// An empty body resets every credential.
pub async fn reset_channels(
    State(state): State<GatewayState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let request: ResetRequest = if body.is_empty() {
        ResetRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ParleyError::InvalidInput(format!("invalid reset request: {e}")))?
    };
    let reset = state.fallback.reset_channel_health(request.channel);
    Ok(Json(json!({"reset": reset})))
}

/// POST /v1/communications
///
/// 200 when some channel delivered, 502 otherwise; the body always carries
/// the per-attempt report.
pub async fn send_communication(
    State(state): State<GatewayState>,
    Json(request): Json<CommunicationRequest>,
) -> Response {
    if request.body.trim().is_empty() {
        return ApiError(ParleyError::InvalidInput("body must not be empty".to_string()))
            .into_response();
    }
    let result = state.fallback.send(&request).await;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(result)).into_response()
}

#[derive(Debug, Serialize)]
pub struct BulkAccepted {
    pub accepted: usize,
    pub window_remaining: u32,
}

/// POST /v1/communications/bulk
///
/// Runs in the background; the paced send can take far longer than a
/// request timeout.
pub async fn send_bulk(
    State(state): State<GatewayState>,
    Json(request): Json<BulkRequest>,
) -> ApiResult<(StatusCode, Json<BulkAccepted>)> {
    if request.recipients.is_empty() {
        return Err(ParleyError::InvalidInput("recipients must not be empty".to_string()).into());
    }
    let accepted = BulkAccepted {
        accepted: request.recipients.len(),
        window_remaining: state.bulk.window().remaining(),
    };
    let bulk = state.bulk.clone();
    tokio::spawn(async move {
        let report: BulkReport = bulk.send(&request).await;
        tracing::info!(
            total = report.total,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            "bulk send finished"
        );
    });
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}
