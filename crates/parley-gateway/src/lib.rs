// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Parley conversation engine.
//!
//! Accepts provider webhooks (messages and delivery statuses) and exposes
//! the admin API over conversations, buckets, channel health and
//! recipient-keyed communications.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod webhook;

pub use auth::AuthConfig;
pub use server::{router, start_server, GatewayState};
