// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel binding resolution.
//!
//! Lookup order: exact active `(platform, account_reference)`, then the oldest
//! active generic binding on the platform. Lookup failures never propagate.

use parley_core::identity::canonical_handle;
use parley_core::types::{Channel, ChannelBinding, RoutingDecision};
use parley_storage::queries::bindings;
use parley_storage::Database;
use tracing::{debug, warn};

/// Read-only router over the channel binding table.
#[derive(Clone)]
pub struct ChannelRouter {
    db: Database,
}

impl ChannelRouter {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Resolve the binding serving `identifier` on `channel`'s platform.
    ///
    /// Phone identifiers are compared in comparison form. Storage errors are
    /// logged and reported as no binding.
    pub async fn resolve_binding(
        &self,
        channel: Channel,
        identifier: &str,
    ) -> Option<ChannelBinding> {
        let platform = channel.platform();
        let reference = match canonical_handle(channel, identifier) {
            Ok(reference) => reference,
            Err(e) => {
                warn!(%channel, identifier, error = %e, "unroutable identifier");
                return None;
            }
        };

        match bindings::find_active_binding(&self.db, platform, &reference).await {
            Ok(Some(binding)) => {
                debug!(%platform, binding_id = %binding.id, "exact channel binding");
                return Some(binding);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(%platform, error = %e, "channel binding lookup failed");
                return None;
            }
        }

        match bindings::oldest_generic_binding(&self.db, platform).await {
            Ok(found) => {
                if let Some(binding) = &found {
                    debug!(%platform, binding_id = %binding.id, "generic channel binding");
                }
                found
            }
            Err(e) => {
                warn!(%platform, error = %e, "generic binding lookup failed");
                None
            }
        }
    }

    /// Routing metadata for a brand-new conversation.
    pub async fn routing(&self, channel: Channel, identifier: &str) -> RoutingDecision {
        match self.resolve_binding(channel, identifier).await {
            Some(binding) => RoutingDecision {
                column_id: binding.default_column_id,
                agent_id: binding.default_agent_id,
                traffic_source: binding
                    .traffic_source
                    .unwrap_or_else(|| RoutingDecision::direct().traffic_source),
                channel_binding_id: Some(binding.id),
            },
            None => RoutingDecision::direct(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::Platform;

    fn binding(platform: Platform, reference: &str, generic: bool) -> ChannelBinding {
        ChannelBinding {
            id: String::new(),
            platform,
            account_reference: reference.to_string(),
            is_active: true,
            is_generic: generic,
            default_column_id: None,
            default_agent_id: Some(format!("agent-{reference}")),
            traffic_source: Some(format!("src-{reference}")),
            credential: None,
            created_at: String::new(),
        }
    }

    #[tokio::test]
    async fn phone_identifiers_match_in_comparison_form() {
        let db = Database::open_in_memory().await.unwrap();
        let stored = bindings::insert_binding(&db, &binding(Platform::Whatsapp, "5512345678", false))
            .await
            .unwrap();
        let router = ChannelRouter::new(db);

        let found = router
            .resolve_binding(Channel::Wa, "+52 1 55 1234 5678")
            .await
            .unwrap();
        assert_eq!(found.id, stored.id);
    }

    #[tokio::test]
    async fn falls_back_to_generic_then_direct() {
        let db = Database::open_in_memory().await.unwrap();
        let generic = bindings::insert_binding(&db, &binding(Platform::Whatsapp, "any", true))
            .await
            .unwrap();
        let router = ChannelRouter::new(db);

        let decision = router.routing(Channel::Wa, "5599999999").await;
        assert_eq!(decision.channel_binding_id.as_deref(), Some(generic.id.as_str()));
        assert_eq!(decision.agent_id.as_deref(), Some("agent-any"));
        assert_eq!(decision.traffic_source, "src-any");

        let none = router.routing(Channel::Ig, "someone").await;
        assert_eq!(none, RoutingDecision::direct());
    }

    #[tokio::test]
    async fn empty_identifier_is_unroutable() {
        let db = Database::open_in_memory().await.unwrap();
        let router = ChannelRouter::new(db);
        assert!(router.resolve_binding(Channel::Wa, "no digits").await.is_none());
    }
}
