// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as ordered delay windows, credential shapes, and threshold ordering.

use std::str::FromStr;

use parley_core::types::DeliveryChannel;

use crate::diagnostic::ConfigError;
use crate::model::ParleyConfig;

/// WhatsApp tokens at or below this length are placeholders, not credentials.
const MIN_WHATSAPP_TOKEN_LEN: usize = 10;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        invalid("storage.database_path must not be empty".to_string());
    }

    if config.dispatch.max_attempts < 1 {
        invalid("dispatch.max_attempts must be at least 1".to_string());
    }

    if config.worker.max_attempts < 1 {
        invalid("worker.max_attempts must be at least 1".to_string());
    }

    if config.worker.queue_capacity < 1 {
        invalid("worker.queue_capacity must be at least 1".to_string());
    }

    let fallback = &config.fallback;
    if fallback.degraded_after < 1 {
        invalid("fallback.degraded_after must be at least 1".to_string());
    }
    if fallback.down_after < fallback.degraded_after {
        invalid(format!(
            "fallback.down_after ({}) must not be lower than fallback.degraded_after ({})",
            fallback.down_after, fallback.degraded_after
        ));
    }
    if DeliveryChannel::from_str(&fallback.backup_channel).is_err() {
        invalid(format!(
            "fallback.backup_channel `{}` is not one of whatsapp, email, sms, push",
            fallback.backup_channel
        ));
    }

    let bulk = &config.bulk;
    if bulk.min_delay_ms > bulk.max_delay_ms {
        invalid(format!(
            "bulk.min_delay_ms ({}) must not exceed bulk.max_delay_ms ({})",
            bulk.min_delay_ms, bulk.max_delay_ms
        ));
    }
    if bulk.batch_pause_min_ms > bulk.batch_pause_max_ms {
        invalid(format!(
            "bulk.batch_pause_min_ms ({}) must not exceed bulk.batch_pause_max_ms ({})",
            bulk.batch_pause_min_ms, bulk.batch_pause_max_ms
        ));
    }
    if bulk.batch_size < 1 {
        invalid("bulk.batch_size must be at least 1".to_string());
    }

    if let Some(token) = &config.whatsapp.token
        && token.trim().len() <= MIN_WHATSAPP_TOKEN_LEN
    {
        invalid(format!(
            "whatsapp.token must be longer than {MIN_WHATSAPP_TOKEN_LEN} characters"
        ));
    }
    for (i, token) in config.whatsapp.backup_tokens.iter().enumerate() {
        if token.trim().len() <= MIN_WHATSAPP_TOKEN_LEN {
            invalid(format!(
                "whatsapp.backup_tokens[{i}] must be longer than {MIN_WHATSAPP_TOKEN_LEN} characters"
            ));
        }
    }

    let identity = &config.identity;
    if identity.country_code.is_empty() || !identity.country_code.chars().all(|c| c.is_ascii_digit())
    {
        invalid(format!(
            "identity.country_code `{}` must be one or more digits",
            identity.country_code
        ));
    }
    if !identity.mobile_indicator.chars().all(|c| c.is_ascii_digit()) {
        invalid(format!(
            "identity.mobile_indicator `{}` must contain only digits",
            identity.mobile_indicator
        ));
    }

    let gateway = &config.gateway;
    if gateway.enabled {
        let host = gateway.host.trim();
        let is_loopback = host == "localhost"
            || host
                .parse::<std::net::IpAddr>()
                .map(|ip| ip.is_loopback())
                .unwrap_or(false);
        let has_token = gateway
            .bearer_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if host.is_empty() {
            invalid("gateway.host must not be empty".to_string());
        } else if !is_loopback && !has_token {
            invalid(format!(
                "gateway.bearer_token is required when binding to non-loopback host `{host}`"
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
