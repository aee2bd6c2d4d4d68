// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Parley configuration system.

use std::path::Path;

use figment::Jail;
use parley_config::diagnostic::ConfigError;
use parley_config::model::ParleyConfig;
use parley_config::{load_and_validate_str, load_config_from_path, load_config_from_str};

#[test]
fn valid_toml_deserializes_into_parley_config() {
    let toml = r#"
[service]
name = "crm-east"
log_level = "debug"

[storage]
database_path = "/tmp/parley-test.db"
wal_mode = false

[identity]
country_code = "52"
mobile_indicator = "1"

[gate]
default_agent = "support_bot"
default_model = "gpt-4o-mini"
self_signatures = ["soy ara"]

[gate.agent_tools]
support_bot = ["lookup_order", "create_ticket"]

[bulk]
max_per_hour = 20
batch_size = 5

[whatsapp]
token = "whapi-primary-token"
backup_tokens = ["whapi-backup-token-1"]
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "crm-east");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/parley-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.gate.default_agent, "support_bot");
    assert_eq!(
        config.gate.agent_tools.get("support_bot").map(Vec::len),
        Some(2)
    );
    assert_eq!(config.bulk.max_per_hour, 20);
    assert_eq!(config.bulk.batch_size, 5);
    // Untouched keys keep their defaults.
    assert_eq!(config.bulk.min_delay_ms, 100);
    assert_eq!(config.whatsapp.token.as_deref(), Some("whapi-primary-token"));
    assert_eq!(config.whatsapp.backup_tokens.len(), 1);
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    let defaults = ParleyConfig::default();
    assert_eq!(config.service.name, defaults.service.name);
    assert_eq!(config.bulk.max_per_hour, 500);
    assert_eq!(config.bulk.batch_size, 50);
    assert_eq!(config.fallback.degraded_after, 1);
    assert_eq!(config.fallback.down_after, 3);
    assert_eq!(config.fallback.backup_channel, "email");
    assert_eq!(config.identity.country_code, "52");
    assert!(config.gate.low_value_phrases.iter().any(|p| p == "gracias"));
}

#[test]
fn unknown_key_reports_suggestion() {
    let toml = r#"
[bulk]
max_per_hr = 10
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "max_per_hr");
            assert_eq!(suggestion.as_deref(), Some("max_per_hour"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn wrong_type_reports_invalid_type() {
    let toml = r#"
[dispatch]
max_attempts = "three"
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::InvalidType { .. })));
}

#[test]
fn semantic_errors_are_collected() {
    let toml = r#"
[bulk]
min_delay_ms = 900
max_delay_ms = 100

[whatsapp]
token = "tiny"
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(errors.len() >= 2);
    assert!(errors
        .iter()
        .all(|e| matches!(e, ConfigError::Validation { .. })));
}

#[test]
fn env_overrides_file_values() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "parley.toml",
            r#"
[bulk]
max_per_hour = 40

[whatsapp]
base_url = "https://whapi.example.test"
"#,
        )?;
        jail.set_env("PARLEY_BULK_MAX_PER_HOUR", "25");
        jail.set_env("PARLEY_GATEWAY_BEARER_TOKEN", "env-secret");
        jail.set_env("PARLEY_WHATSAPP_TOKEN", "wa-env-token");

        let config = load_config_from_path(Path::new("parley.toml"))?;
        assert_eq!(config.bulk.max_per_hour, 25);
        assert_eq!(config.whatsapp.base_url, "https://whapi.example.test");
        assert_eq!(config.gateway.bearer_token.as_deref(), Some("env-secret"));
        assert_eq!(config.whatsapp.token.as_deref(), Some("wa-env-token"));
        Ok(())
    });
}

#[test]
fn diagnostics_render_without_panicking() {
    let errors = load_and_validate_str("[gate]\ndefualt_agent = \"x\"\n").unwrap_err();
    parley_config::render_errors(&errors);
}
