// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for outbound transports (WhatsApp, email, SMS, push).

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{DeliveryChannel, MessageId, OutboundMessage};

/// One send credential on one transport.
///
/// Several adapters may exist for the same [`DeliveryChannel`] (a primary
/// account plus backups); callers select between them.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Transport this adapter delivers through.
    fn channel(&self) -> DeliveryChannel;

    /// Sends a message and returns the provider-assigned id.
    ///
    /// Implementations convert `msg.recipient` into their own transport form.
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, ParleyError>;
}
