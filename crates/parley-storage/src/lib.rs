// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Parley conversation engine.
//!
//! WAL-mode SQLite with embedded migrations, a single-writer connection via
//! `tokio-rusqlite`, and typed operations for conversations, messages,
//! buckets, channel bindings, trigger rules and the audit tables.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::{format_timestamp, now_timestamp, Database};
pub use models::*;
