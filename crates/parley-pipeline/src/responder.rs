// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the external automated responder.
//!
//! The responder receives the gated request as JSON and answers with
//! `{"content": "..."}`. An empty or missing content means no reply.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use tracing::debug;

use parley_config::model::ResponderConfig;
use parley_core::traits::collaborator::Responder;
use parley_core::types::ResponseRequest;
use parley_core::ParleyError;

#[derive(Debug, Deserialize)]
struct ResponderReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpResponder {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpResponder {
    pub fn new(
        endpoint: String,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ParleyError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                    ParleyError::Config(format!("invalid responder API key header value: {e}"))
                })?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ParleyError::Responder {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Responder for HttpResponder {
    async fn respond(&self, request: ResponseRequest) -> Result<Option<String>, ParleyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ParleyError::Responder {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, conversation_id = %request.conversation_id, "responder answered");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ParleyError::Responder {
                message: format!("responder returned {status}: {body}"),
                source: None,
            });
        }

        let reply: ResponderReply = response.json().await.map_err(|e| ParleyError::Responder {
            message: format!("failed to parse responder reply: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(reply
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()))
    }
}

/// Used when no responder endpoint is configured.
pub struct DisabledResponder;

#[async_trait]
impl Responder for DisabledResponder {
    async fn respond(&self, _request: ResponseRequest) -> Result<Option<String>, ParleyError> {
        Ok(None)
    }
}

/// Build the responder described by `config`.
pub fn build_responder(config: &ResponderConfig) -> Result<Arc<dyn Responder>, ParleyError> {
    match &config.endpoint {
        Some(endpoint) => Ok(Arc::new(HttpResponder::new(
            endpoint.clone(),
            config.api_key.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        None => Ok(Arc::new(DisabledResponder)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::{HistoryEntry, Role};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ResponseRequest {
        ResponseRequest {
            conversation_id: "conv-1".to_string(),
            agent_id: "sales_ara".to_string(),
            model: "gpt-4o".to_string(),
            tools: vec!["catalog".to_string()],
            content: "quiero comprar".to_string(),
            history: vec![HistoryEntry {
                role: Role::User,
                content: "quiero comprar".to_string(),
            }],
        }
    }

    fn responder(server: &MockServer) -> HttpResponder {
        HttpResponder::new(
            format!("{}/respond", server.uri()),
            Some("secret"),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn posts_request_and_reads_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/respond"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "conversation_id": "conv-1",
                "agent_id": "sales_ara",
                "tools": ["catalog"]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"content": "¡Claro! Te ayudo."})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let reply = responder(&server).respond(request()).await.unwrap();
        assert_eq!(reply.as_deref(), Some("¡Claro! Te ayudo."));
    }

    #[tokio::test]
    async fn blank_content_is_no_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"content": "  "})))
            .mount(&server)
            .await;
        assert!(responder(&server).respond(request()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;
        let err = responder(&server).respond(request()).await.unwrap_err();
        assert!(err.to_string().contains("502"), "{err}");
    }

    #[tokio::test]
    async fn disabled_without_endpoint() {
        let responder = build_responder(&ResponderConfig::default()).unwrap();
        assert!(responder.respond(request()).await.unwrap().is_none());
    }
}
