// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rule evaluation and action execution.

use parley_core::types::RuleAction;
use parley_core::ParleyError;
use parley_storage::queries::{conversations, rules};
use parley_storage::Database;
use tracing::{debug, info, warn};

use crate::matcher::trigger_matches;

/// What one evaluation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleEvaluation {
    /// Ids of the rules that matched, in evaluation order.
    pub fired: Vec<String>,
    /// The rule whose stop flag ended evaluation, if any.
    pub stopped_by: Option<String>,
}

#[derive(Clone)]
pub struct RuleEngine {
    db: Database,
}

impl RuleEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Evaluate every rule in scope for a message, highest priority first.
    ///
    /// Only loading the rules can fail. Action and audit failures are logged
    /// and evaluation continues with the next action.
    pub async fn evaluate(
        &self,
        message_id: &str,
        content: &str,
        conversation_id: &str,
        binding_id: Option<&str>,
    ) -> Result<RuleEvaluation, ParleyError> {
        let candidates = rules::active_rules_for(&self.db, binding_id).await?;
        let mut evaluation = RuleEvaluation::default();

        for rule in candidates {
            if !trigger_matches(&rule.id, &rule.trigger, content) {
                continue;
            }
            info!(
                rule_id = %rule.id,
                rule = %rule.name,
                conversation_id,
                trigger = rule.trigger.kind(),
                "trigger rule matched"
            );

            for action in &rule.actions {
                self.apply(conversation_id, action).await;
            }

            if let Err(e) =
                rules::record_rule_trigger(&self.db, conversation_id, &rule.id, Some(message_id))
                    .await
            {
                warn!(rule_id = %rule.id, error = %e, "failed to record rule trigger (non-fatal)");
            }

            evaluation.fired.push(rule.id.clone());
            if rule.stop_propagation {
                debug!(rule_id = %rule.id, "stop propagation");
                evaluation.stopped_by = Some(rule.id);
                break;
            }
        }
        Ok(evaluation)
    }

    async fn apply(&self, conversation_id: &str, action: &RuleAction) {
        let result = match action {
            RuleAction::MoveColumn { column_id } => {
                conversations::set_column(&self.db, conversation_id, column_id).await
            }
            RuleAction::AssignAgent { agent_id } => {
                conversations::set_agent(&self.db, conversation_id, agent_id).await
            }
            RuleAction::SetStatus { status } => {
                conversations::set_status(&self.db, conversation_id, *status).await
            }
        };
        match result {
            Ok(true) => debug!(conversation_id, ?action, "rule action applied"),
            Ok(false) => warn!(conversation_id, ?action, "rule action target missing"),
            Err(e) => warn!(conversation_id, ?action, error = %e, "rule action failed (non-fatal)"),
        }
    }
}
