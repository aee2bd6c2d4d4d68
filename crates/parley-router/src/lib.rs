// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing for inbound identifiers.
//!
//! This crate provides:
//! - [`ChannelRouter`]: maps `(platform, account identifier)` to an active
//!   channel binding and the routing metadata new conversations inherit
//! - [`ConversationResolver`]: finds or creates the conversation for a
//!   `(channel, handle)` pair (exact, then suffix, then routed creation)

pub mod binding;
pub mod resolver;

pub use binding::ChannelRouter;
pub use resolver::{ConversationResolver, Resolution};
