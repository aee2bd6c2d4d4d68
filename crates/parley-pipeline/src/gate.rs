// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response gate: decides whether the automated responder may answer a
//! message, and with which agent, model and tools.
//!
//! Checks short-circuit in order: bucket mode, self-authored payloads,
//! self-signature loops, low-value content.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use strum::{Display, IntoStaticStr};
use tracing::debug;

use parley_config::model::GateConfig;
use parley_core::types::{
    Column, ColumnMode, Conversation, Direction, Role, ToolsMode,
};
use parley_core::ParleyError;

/// Why the gate refused to run the responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum DenyReason {
    NoColumn,
    HumanMode,
    SelfAuthored,
    SelfSignature,
    LowValue,
}

/// Effective responder settings for one allowed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePlan {
    pub agent_id: String,
    pub model: String,
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow(ResponsePlan),
    Deny(DenyReason),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow(_))
    }
}

/// The message being gated, with the bucket its conversation sits in.
#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a> {
    pub conversation: &'a Conversation,
    pub column: Option<&'a Column>,
    pub content: &'a str,
    pub direction: Direction,
    pub role: Role,
    pub from_me: bool,
}

pub struct ResponseGate {
    self_signatures: Vec<String>,
    low_value: Option<Regex>,
    default_agent: String,
    default_model: String,
    agent_tools: HashMap<String, Vec<String>>,
}

impl ResponseGate {
    pub fn new(config: &GateConfig) -> Result<Self, ParleyError> {
        let phrases: Vec<String> = config
            .low_value_phrases
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(regex::escape)
            .collect();
        let low_value = if phrases.is_empty() {
            None
        } else {
            let pattern = format!("^(?:{})$", phrases.join("|"));
            let re = RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| ParleyError::Config(format!("gate.low_value_phrases: {e}")))?;
            Some(re)
        };

        Ok(Self {
            self_signatures: config
                .self_signatures
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            low_value,
            default_agent: config.default_agent.clone(),
            default_model: config.default_model.clone(),
            agent_tools: config.agent_tools.clone(),
        })
    }

    pub fn evaluate(&self, input: &GateInput<'_>) -> GateDecision {
        let decision = self.decide(input);
        if let GateDecision::Deny(reason) = &decision {
            debug!(
                conversation_id = %input.conversation.id,
                reason = %reason,
                "response gate denied"
            );
        }
        decision
    }

    fn decide(&self, input: &GateInput<'_>) -> GateDecision {
        let column = match input.column {
            None => return GateDecision::Deny(DenyReason::NoColumn),
            Some(c) if c.mode == ColumnMode::Human => {
                return GateDecision::Deny(DenyReason::HumanMode);
            }
            Some(c) => c,
        };

        if input.from_me || input.direction == Direction::Outbound || input.role == Role::Assistant
        {
            return GateDecision::Deny(DenyReason::SelfAuthored);
        }

        let lowered = input.content.to_lowercase();
        if self.self_signatures.iter().any(|s| lowered.contains(s)) {
            return GateDecision::Deny(DenyReason::SelfSignature);
        }

        if self.is_low_value(input.content) {
            return GateDecision::Deny(DenyReason::LowValue);
        }

        GateDecision::Allow(self.plan(input.conversation, column))
    }

    /// Whole-string, case-insensitive match of the trimmed content.
    pub fn is_low_value(&self, content: &str) -> bool {
        self.low_value
            .as_ref()
            .is_some_and(|re| re.is_match(content.trim()))
    }

    fn plan(&self, conversation: &Conversation, column: &Column) -> ResponsePlan {
        let agent_id = conversation
            .agent_override_id
            .clone()
            .or_else(|| column.config.agent_id.clone())
            .unwrap_or_else(|| self.default_agent.clone());
        let model = conversation
            .model_override
            .clone()
            .or_else(|| column.config.model.clone())
            .unwrap_or_else(|| self.default_model.clone());
        let tools = match column.config.tools_policy.mode {
            ToolsMode::Override => column.config.tools_policy.allowed_tools.clone(),
            ToolsMode::Inherit => self.agent_tools.get(&agent_id).cloned().unwrap_or_default(),
        };
        ResponsePlan {
            agent_id,
            model,
            tools,
        }
    }
}
