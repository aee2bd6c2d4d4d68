// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table family.

pub mod bindings;
pub mod columns;
pub mod comm_logs;
pub mod contacts;
pub mod conversations;
pub mod messages;
pub mod rules;
