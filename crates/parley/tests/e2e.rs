// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end integration tests for the complete Parley pipeline.
//!
//! Each test creates an isolated TestHarness with temp SQLite, mock
//! transports and collaborators. Tests are independent and order-insensitive.

use parley_core::types::{
    Channel, ColumnConfig, ColumnMode, ConversationStatus, DeliveryChannel, DeliveryStatus,
    Direction, PriorityClass, RuleAction, RuleTrigger, TriggerRule,
};
use parley_pipeline::{Disposition, InboundEvent, ProviderMeta};
use parley_resilience::{BulkRequest, CommunicationRequest, Recipient};
use parley_storage::queries::{columns, conversations, messages, rules};
use parley_storage::NewColumn;
use parley_test_utils::TestHarness;

fn keyword_rule(name: &str, keyword: &str, priority: i64, actions: Vec<RuleAction>, stop: bool) -> TriggerRule {
    TriggerRule {
        id: String::new(),
        name: name.to_string(),
        channel_binding_id: None,
        is_global: true,
        is_active: true,
        trigger: RuleTrigger::Keyword {
            keywords: vec![keyword.to_string()],
        },
        priority,
        actions,
        stop_propagation: stop,
    }
}

// ---- Ingestion: dedup, echo, identity ----

#[tokio::test]
async fn test_same_provider_id_is_stored_once() {
    let harness = TestHarness::builder().build().await.unwrap();

    let first = harness
        .receive("5512345678", "¿tienen envío a Monterrey?", Some("wamid.A"))
        .await
        .unwrap();
    let second = harness
        .receive("5512345678", "¿tienen envío a Monterrey?", Some("wamid.A"))
        .await
        .unwrap();

    assert_eq!(first.disposition, Disposition::Stored);
    assert_eq!(second.disposition, Disposition::Duplicate);
    assert_eq!(second.message.id, first.message.id);
    let stored = messages::list_messages(&harness.db, &first.message.conversation_id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_provider_echo_of_reply_is_suppressed() {
    let harness = TestHarness::builder()
        .with_reply("Sí, enviamos a todo el país")
        .build()
        .await
        .unwrap();

    let outcome = harness
        .receive("5512345678", "¿hacen envíos nacionales?", Some("wamid.B"))
        .await
        .unwrap();
    let reply = outcome.reply.unwrap();
    harness.settle().await;

    let echo = harness
        .engine
        .ingest
        .ingest(InboundEvent {
            channel: Channel::Wa,
            handle: "5512345678".to_string(),
            content: reply.content.clone(),
            meta: ProviderMeta::self_authored(Some("wamid.echo".to_string())),
        })
        .await
        .unwrap();
    assert_eq!(echo.disposition, Disposition::EchoSuppressed);

    let stored = messages::list_messages(&harness.db, &reply.conversation_id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_local_number_resolves_to_existing_international_conversation() {
    let harness = TestHarness::builder().build().await.unwrap();

    let international = harness
        .receive("5215512345678", "hola, buen día", None)
        .await
        .unwrap();
    let local = harness
        .receive("5512345678", "sigo esperando respuesta", None)
        .await
        .unwrap();

    assert!(international.conversation_created);
    assert!(!local.conversation_created);
    assert_eq!(
        local.message.conversation_id,
        international.message.conversation_id
    );
    let all = conversations::list_conversations(&harness.db, None, 10)
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

// ---- Response gate ----

#[tokio::test]
async fn test_self_signature_never_triggers_reply() {
    for mode in [ColumnMode::Ai, ColumnMode::Human] {
        let harness = TestHarness::builder()
            .with_reply("respuesta automática")
            .with_column_mode(mode)
            .build()
            .await
            .unwrap();
        let outcome = harness
            .receive("5512345678", "Hola! soy Ara, tu asesora", None)
            .await
            .unwrap();
        assert!(outcome.reply.is_none());
        assert_eq!(harness.responder.call_count().await, 0);
    }
}

#[tokio::test]
async fn test_low_value_messages_never_trigger_reply() {
    let harness = TestHarness::builder()
        .with_reply("¿En qué más te ayudo?")
        .build()
        .await
        .unwrap();

    for content in ["ok", "Gracias", " 👍 "] {
        let outcome = harness.receive("5512345678", content, None).await.unwrap();
        assert!(outcome.reply.is_none(), "{content} should not be answered");
    }
    let outcome = harness
        .receive("5512345678", "ok, pero necesito ayuda", None)
        .await
        .unwrap();
    assert!(outcome.reply.is_some());
}

// ---- Rules ----

#[tokio::test]
async fn test_rules_apply_in_priority_order() {
    let harness = TestHarness::builder().build().await.unwrap();
    rules::insert_rule(
        &harness.db,
        &keyword_rule(
            "billing",
            "factura",
            20,
            vec![RuleAction::AssignAgent {
                agent_id: "billing_bot".to_string(),
            }],
            false,
        ),
    )
    .await
    .unwrap();
    rules::insert_rule(
        &harness.db,
        &keyword_rule(
            "catch-all",
            "factura",
            10,
            vec![RuleAction::AssignAgent {
                agent_id: "sales_ara".to_string(),
            }],
            false,
        ),
    )
    .await
    .unwrap();

    let outcome = harness
        .receive("5512345678", "necesito mi factura de marzo", None)
        .await
        .unwrap();
    let conversation = conversations::get_conversation(&harness.db, &outcome.message.conversation_id)
        .await
        .unwrap()
        .unwrap();
    // Lower priority ran last.
    assert_eq!(conversation.agent_override_id.as_deref(), Some("sales_ara"));
}

#[tokio::test]
async fn test_stop_propagation_blocks_lower_rules() {
    let harness = TestHarness::builder().build().await.unwrap();
    let escalations = columns::insert_column(
        &harness.db,
        &NewColumn {
            name: "Escalaciones".to_string(),
            position: 3,
            mode: ColumnMode::Human,
            config: ColumnConfig::default(),
        },
    )
    .await
    .unwrap();
    rules::insert_rule(
        &harness.db,
        &keyword_rule(
            "complaint",
            "queja",
            50,
            vec![RuleAction::SetStatus {
                status: ConversationStatus::Review,
            }],
            true,
        ),
    )
    .await
    .unwrap();
    rules::insert_rule(
        &harness.db,
        &keyword_rule(
            "escalate",
            "queja",
            5,
            vec![RuleAction::MoveColumn {
                column_id: escalations.id.clone(),
            }],
            false,
        ),
    )
    .await
    .unwrap();

    let outcome = harness
        .receive("5512345678", "quiero poner una queja", None)
        .await
        .unwrap();
    let conversation = conversations::get_conversation(&harness.db, &outcome.message.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.status, ConversationStatus::Review);
    assert_ne!(conversation.column_id.as_deref(), Some(escalations.id.as_str()));
}

// ---- Dispatch ----

#[tokio::test]
async fn test_dispatch_stops_after_configured_attempts() {
    let harness = TestHarness::builder()
        .with_reply("Te comparto el catálogo")
        .with_dispatch_attempts(4)
        .build()
        .await
        .unwrap();
    harness.whatsapp.set_failing(true);

    let outcome = harness
        .receive("5512345678", "mándame el catálogo", None)
        .await
        .unwrap();
    let reply = outcome.reply.unwrap();
    harness.settle().await;

    assert_eq!(harness.whatsapp.attempts(), 4);
    let stored = messages::get_message(&harness.db, &reply.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.direction, Direction::Outbound);
    assert_eq!(stored.status, DeliveryStatus::Failed);
    assert!(stored.error.is_some());
}

// ---- Fallback router ----

#[tokio::test]
async fn test_critical_fans_out_and_succeeds_if_any_channel_delivers() {
    let harness = TestHarness::builder()
        .with_transport(DeliveryChannel::Sms)
        .build()
        .await
        .unwrap();
    harness.whatsapp.set_failing(true);

    let result = harness
        .fallback
        .send(&CommunicationRequest {
            recipient: Recipient {
                phone: Some("5512345678".to_string()),
                email: Some("ana@example.com".to_string()),
                push_id: None,
            },
            subject: Some("Alerta de seguridad".to_string()),
            body: "Detectamos un acceso nuevo a tu cuenta".to_string(),
            priority: PriorityClass::Critical,
            client_id: None,
            conversation_id: None,
        })
        .await;

    assert!(result.success);
    let mut tried: Vec<DeliveryChannel> = result.attempts.iter().map(|a| a.channel).collect();
    tried.sort();
    tried.dedup();
    assert_eq!(
        tried,
        vec![DeliveryChannel::Whatsapp, DeliveryChannel::Email, DeliveryChannel::Sms]
    );
    assert_eq!(harness.email.sent_count().await, 1);
    assert_eq!(harness.transport(DeliveryChannel::Sms).unwrap().sent_count().await, 1);
}

#[tokio::test]
async fn test_instant_stops_at_first_success() {
    let harness = TestHarness::builder()
        .with_transport(DeliveryChannel::Sms)
        .build()
        .await
        .unwrap();

    let result = harness
        .fallback
        .send(&CommunicationRequest {
            recipient: Recipient::phone("5512345678"),
            subject: None,
            body: "Tu código es 482913".to_string(),
            priority: PriorityClass::Instant,
            client_id: None,
            conversation_id: None,
        })
        .await;

    assert!(result.success);
    assert_eq!(result.channel_used, Some(DeliveryChannel::Whatsapp));
    assert_eq!(harness.transport(DeliveryChannel::Sms).unwrap().attempts(), 0);
}

// ---- Bulk ----

#[tokio::test]
async fn test_bulk_cap_skips_remainder() {
    let harness = TestHarness::builder().with_hourly_cap(3).build().await.unwrap();

    let report = harness
        .bulk
        .send(&BulkRequest {
            recipients: (1..=5)
                .map(|i| Recipient::phone(format!("551234567{i}")))
                .collect(),
            subject: None,
            body: "Nuevos horarios de atención".to_string(),
            priority: PriorityClass::Informational,
            client_id: None,
        })
        .await;

    assert_eq!(report.total, 5);
    assert_eq!(report.sent, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped, 2);
    assert_eq!(harness.whatsapp.sent_count().await, 3);
}
