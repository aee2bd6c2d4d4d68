// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter and collaborator trait definitions.
//!
//! Channel adapters extend the [`PluginAdapter`] base trait. External
//! collaborators (responder, fact extraction, contact directory) are plain
//! `#[async_trait]` traits so the engine can be driven by mocks in tests.

pub mod adapter;
pub mod channel;
pub mod collaborator;

pub use adapter::PluginAdapter;
pub use channel::ChannelAdapter;
pub use collaborator::{ContactDirectory, FactExtractor, Responder};
