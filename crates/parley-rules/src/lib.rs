// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger rules ("mini chips") evaluated on inbound message content.
//!
//! Keyword and regex triggers are matched locally; intent and mood triggers
//! belong to an external classifier and never match here. Matching rules run
//! their typed actions against the conversation and leave an audit record.

pub mod engine;
pub mod matcher;

pub use engine::{RuleEngine, RuleEvaluation};
pub use matcher::{fold_text, trigger_matches};
