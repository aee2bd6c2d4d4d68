// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Parley integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockChannel`] - transport with scripted failures and captured sends
//! - [`MockResponder`] - automated responder with queued replies
//! - [`MockFactExtractor`], [`MockContactDirectory`] - background collaborators
//! - [`TestHarness`] - the full engine on a temp database

pub mod harness;
pub mod mock_channel;
pub mod mock_responder;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_channel::MockChannel;
pub use mock_responder::{MockContactDirectory, MockFactExtractor, MockResponder};
