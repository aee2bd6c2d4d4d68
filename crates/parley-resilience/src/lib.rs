// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient-keyed delivery for the Parley conversation engine.
//!
//! [`FallbackRouter`] walks a priority-dependent chain of transports and
//! credentials, tracking each credential in a [`HealthRegistry`].
//! [`BulkDispatcher`] paces one message to many recipients through the
//! router under an hourly [`SendWindow`].

pub mod bulk;
pub mod fallback;
pub mod health;

pub use bulk::{BulkDispatcher, BulkReport, BulkRequest, SendWindow};
pub use fallback::{
    chain_for, CommunicationRequest, CommunicationResult, FallbackRouter, Recipient,
};
pub use health::{ChannelHealth, CredentialKey, HealthRegistry, HealthState};
