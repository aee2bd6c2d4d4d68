// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway routes exercised against a full test harness.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use parley_core::types::{
    ColumnConfig, ColumnMode, DeliveryStatus, Direction, MessageType,
};
use parley_gateway::{router, GatewayState};
use parley_storage::queries::columns;
use parley_storage::NewColumn;
use parley_test_utils::TestHarness;

const TOKEN: &str = "test-admin-token";

fn app(harness: &TestHarness) -> Router {
    router(GatewayState::new(
        harness.engine.clone(),
        harness.fallback.clone(),
        harness.bulk.clone(),
        Some(TOKEN.to_string()),
    ))
}

fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {TOKEN}"));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn text_webhook(id: &str, chat: &str, body: &str) -> Value {
    json!({
        "channel_id": "ACCOUNT-1",
        "messages": [{
            "id": id,
            "type": "text",
            "chat_id": chat,
            "from_me": false,
            "text": {"body": body}
        }]
    })
}

#[tokio::test]
async fn health_is_public_and_api_requires_token() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);

    let public = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = call(&app, public).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let anonymous = Request::builder()
        .uri("/v1/conversations")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&app, anonymous).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/v1/conversations")
        .header("authorization", "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_token_config_rejects_everything() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = router(GatewayState::new(
        harness.engine.clone(),
        harness.fallback.clone(),
        harness.bulk.clone(),
        None,
    ));
    let (status, _) = call(&app, request("GET", "/v1/columns", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn webhook_ingests_and_dedups_messages() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);
    let payload = text_webhook("wamid.1", "5215512345678@s.whatsapp.net", "Hola");

    let (status, body) = call(&app, request("POST", "/v1/webhooks/inbound", Some(payload.clone()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "processed": 1, "skipped": 0}));

    let (status, _) = call(&app, request("POST", "/v1/webhooks/inbound", Some(payload))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, conversations) = call(&app, request("GET", "/v1/conversations", None)).await;
    let conversations = conversations.as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    let id = conversations[0]["id"].as_str().unwrap();

    let (status, messages) = call(&app, request("GET", &format!("/v1/conversations/{id}/messages"), None)).await;
    assert_eq!(status, StatusCode::OK);
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "Hola");
    assert_eq!(messages[0]["external_id"], "wamid.1");
}

#[tokio::test]
async fn webhook_batch_skips_unusable_handle_and_keeps_going() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);
    let payload = json!({
        "messages": [
            {"id": "wamid.bcast", "type": "text", "chat_id": "status@broadcast", "text": {"body": "story"}},
            {"id": "wamid.ok", "type": "text", "chat_id": "5512345678@s.whatsapp.net", "text": {"body": "¿siguen abiertos?"}}
        ]
    });

    let (status, body) = call(&app, request("POST", "/v1/webhooks/inbound", Some(payload))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "processed": 1, "skipped": 1}));

    let conversations = harness.engine.admin.list_conversations(None, 10).await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].handle, "5512345678");
}

#[tokio::test]
async fn webhook_media_types_are_stored_with_labels() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);
    let payload = json!({
        "messages": [{
            "id": "wamid.img",
            "type": "image",
            "from": "5512345678@c.us",
            "image": {"link": "https://cdn.example.com/a.jpg", "caption": "mi recibo"}
        }]
    });
    let (status, _) = call(&app, request("POST", "/v1/webhooks/inbound", Some(payload))).await;
    assert_eq!(status, StatusCode::OK);

    let conversations = harness.engine.admin.list_conversations(None, 10).await.unwrap();
    let messages = harness.engine.admin.messages(&conversations[0].id).await.unwrap();
    assert_eq!(messages[0].message_type, MessageType::Image);
    assert_eq!(messages[0].content, "[Image](https://cdn.example.com/a.jpg) mi recibo");
    assert_eq!(messages[0].direction, Direction::Inbound);
}

#[tokio::test]
async fn legacy_webhook_requires_fields() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);

    let (status, body) = call(
        &app,
        request("POST", "/v1/webhooks/inbound", Some(json!({"channel": "WA", "handle": "5512345678"}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = call(
        &app,
        request(
            "POST",
            "/v1/webhooks/inbound",
            Some(json!({"channel": "WEBCHAT", "handle": "visitor-7", "content": "hola"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["conversation_id"].is_string());
}

#[tokio::test]
async fn status_webhook_updates_dispatched_reply() {
    let harness = TestHarness::builder()
        .with_reply("Claro, te ayudo")
        .build()
        .await
        .unwrap();
    let app = app(&harness);

    let outcome = harness
        .receive("5512345678", "quiero información", Some("wamid.in"))
        .await
        .unwrap();
    harness.settle().await;
    let conversation_id = outcome.message.conversation_id.clone();
    let messages = harness.engine.admin.messages(&conversation_id).await.unwrap();
    let reply = messages
        .iter()
        .find(|m| m.direction == Direction::Outbound)
        .unwrap();
    let external_id = reply.external_id.clone().unwrap();

    let (status, body) = call(
        &app,
        request(
            "POST",
            "/v1/webhooks/inbound",
            Some(json!({"statuses": [
                {"id": external_id, "status": "read", "recipient_id": "5215512345678"},
                {"id": external_id, "status": "pending"}
            ]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed_statuses"], 1);

    let mut read = false;
    for _ in 0..50 {
        let messages = harness.engine.admin.messages(&conversation_id).await.unwrap();
        if messages
            .iter()
            .any(|m| m.id == reply.id && m.status == DeliveryStatus::Read)
        {
            read = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(read, "reply should be marked read");
}

#[tokio::test]
async fn conversation_admin_routes() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);
    let outcome = harness.receive("5512345678", "hola", None).await.unwrap();
    let id = outcome.message.conversation_id;

    let sales = columns::insert_column(
        &harness.db,
        &NewColumn {
            name: "Ventas".to_string(),
            position: 1,
            mode: ColumnMode::Human,
            config: ColumnConfig::default(),
        },
    )
    .await
    .unwrap();

    let (status, moved) = call(
        &app,
        request(
            "POST",
            &format!("/v1/conversations/{id}/move"),
            Some(json!({"column_id": sales.id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["column_id"], sales.id.as_str());

    let (status, archived) = call(&app, request("POST", &format!("/v1/conversations/{id}/archive"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(archived["status"], "archived");

    let (_, archived_list) = call(&app, request("GET", "/v1/conversations?status=archived", None)).await;
    assert_eq!(archived_list.as_array().unwrap().len(), 1);

    let (status, _) = call(&app, request("DELETE", &format!("/v1/conversations/{id}"), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(&app, request("GET", &format!("/v1/conversations/{id}/messages"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn column_config_update() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);

    let (_, columns) = call(&app, request("GET", "/v1/columns", None)).await;
    let inbox = columns[0]["id"].as_str().unwrap().to_string();

    let (status, updated) = call(
        &app,
        request(
            "PUT",
            &format!("/v1/columns/{inbox}/config"),
            Some(json!({"config": {"agent_id": "sales-bot"}, "mode": "human"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["config"]["agent_id"], "sales-bot");
    assert_eq!(updated["mode"], "human");

    let (status, _) = call(
        &app,
        request("PUT", "/v1/columns/missing/config", Some(json!({"config": {}}))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn communications_report_delivery() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);

    let (status, body) = call(
        &app,
        request(
            "POST",
            "/v1/communications",
            Some(json!({
                "recipient": {"phone": "5512345678"},
                "body": "Tu código es 1234",
                "priority": "instant"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["channel_used"], "whatsapp");

    harness.whatsapp.set_failing(true);
    let (status, body) = call(
        &app,
        request(
            "POST",
            "/v1/communications",
            Some(json!({
                "recipient": {"phone": "5512345678"},
                "body": "Tu código es 1234",
                "priority": "instant"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().starts_with("All channels failed"));
}

#[tokio::test]
async fn channel_health_routes() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);

    let (status, health) = call(&app, request("POST", "/v1/channels/health/check", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health.as_array().unwrap().len(), 2);

    let (_, snapshot) = call(&app, request("GET", "/v1/channels/health", None)).await;
    assert!(snapshot
        .as_array()
        .unwrap()
        .iter()
        .all(|h| h["status"] == "healthy"));

    let (status, reset) = call(
        &app,
        request("POST", "/v1/channels/reset", Some(json!({"channel": "email"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reset["reset"], 1);

    let (_, reset) = call(&app, request("POST", "/v1/channels/reset", None)).await;
    assert_eq!(reset["reset"], 2);
}

#[tokio::test]
async fn bulk_is_accepted_and_runs_in_background() {
    let harness = TestHarness::builder().with_hourly_cap(10).build().await.unwrap();
    let app = app(&harness);

    let (status, body) = call(
        &app,
        request(
            "POST",
            "/v1/communications/bulk",
            Some(json!({
                "recipients": [{"phone": "5511111111"}, {"phone": "5522222222"}],
                "body": "Promoción de fin de semana"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["accepted"], 2);

    let mut delivered = 0;
    for _ in 0..50 {
        delivered = harness.whatsapp.sent_count().await;
        if delivered == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(delivered, 2);
    assert_eq!(harness.bulk.window().remaining(), 8);

    let (status, _) = call(
        &app,
        request("POST", "/v1/communications/bulk", Some(json!({"recipients": [], "body": "x"}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_delivery_channel_in_reset_is_rejected() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);
    let (status, _) = call(
        &app,
        request("POST", "/v1/channels/reset", Some(json!({"channel": "fax"}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
