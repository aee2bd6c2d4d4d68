// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley conversation engine.
//!
//! This crate provides the error type, the domain model (conversations,
//! messages, buckets, bindings, rules), the adapter and collaborator traits,
//! and the identity normalizer used at every storage and transport boundary.

pub mod error;
pub mod identity;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ParleyError;
pub use types::{HealthStatus, MessageId};

pub use traits::{
    ChannelAdapter, ContactDirectory, FactExtractor, PluginAdapter, Responder,
};

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::types::*;

    #[test]
    fn channel_codes_parse_and_display() {
        assert_eq!(Channel::from_str("WA").unwrap(), Channel::Wa);
        assert_eq!(Channel::from_str("email").unwrap(), Channel::Email);
        assert_eq!(Channel::Webchat.to_string(), "WEBCHAT");
        assert!(Channel::from_str("TELEGRAM").is_err());
    }

    #[test]
    fn channel_platform_mapping() {
        assert_eq!(Channel::Wa.platform(), Platform::Whatsapp);
        assert_eq!(Channel::Ig.platform(), Platform::Instagram);
        assert_eq!(Channel::Fb.platform(), Platform::Facebook);
        assert_eq!(Channel::Email.platform().to_string(), "email");
        assert!(Channel::Wa.is_phone_based());
        assert!(!Channel::Email.is_phone_based());
        assert_eq!(Channel::Ig.delivery_channel(), None);
    }

    #[test]
    fn rule_action_is_a_closed_set() {
        let action: RuleAction =
            serde_json::from_str(r#"{"type":"move_column","column_id":"col-2"}"#).unwrap();
        assert_eq!(
            action,
            RuleAction::MoveColumn {
                column_id: "col-2".into()
            }
        );

        let status: RuleAction =
            serde_json::from_str(r#"{"type":"set_status","status":"review"}"#).unwrap();
        assert_eq!(
            status,
            RuleAction::SetStatus {
                status: ConversationStatus::Review
            }
        );

        let unknown = serde_json::from_str::<RuleAction>(r#"{"type":"send_coupon","code":"X"}"#);
        assert!(unknown.is_err());
    }

    #[test]
    fn regex_trigger_flags_are_optional() {
        let trigger: RuleTrigger =
            serde_json::from_str(r#"{"type":"regex","pattern":"pedido\\s+\\d+"}"#).unwrap();
        assert_eq!(trigger.kind(), "regex");
        match trigger {
            RuleTrigger::Regex { flags, .. } => assert!(flags.is_none()),
            other => panic!("unexpected trigger {other:?}"),
        }
    }

    #[test]
    fn column_config_defaults_to_inherit() {
        let config: ColumnConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.tools_policy.mode, ToolsMode::Inherit);
        assert!(config.agent_id.is_none());
    }

    #[test]
    fn outbound_system_messages_never_dispatch() {
        let mut msg = NewMessage {
            conversation_id: "c1".into(),
            direction: Direction::Outbound,
            role: Role::Assistant,
            message_type: MessageType::Text,
            status: DeliveryStatus::Queued,
            external_id: None,
            content: "hi".into(),
            raw_payload: None,
            skip_dispatch: false,
        };
        assert!(msg.needs_dispatch());
        msg.role = Role::System;
        assert!(!msg.needs_dispatch());
        msg.role = Role::Assistant;
        msg.skip_dispatch = true;
        assert!(!msg.needs_dispatch());
    }

    #[test]
    fn error_variants_render() {
        let err = ParleyError::NotFound {
            entity: "conversation",
            id: "c-9".into(),
        };
        assert_eq!(err.to_string(), "conversation not found: c-9");
        assert_eq!(
            ParleyError::channel("boom").to_string(),
            "channel error: boom"
        );
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_channel_adapter<T: ChannelAdapter>() {}
        fn _assert_responder<T: Responder>() {}
        fn _assert_fact_extractor<T: FactExtractor>() {}
        fn _assert_contact_directory<T: ContactDirectory>() {}
    }
}
