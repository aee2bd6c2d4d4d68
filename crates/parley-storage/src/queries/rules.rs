// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger rule storage and the rule-fired audit trail.

use parley_core::types::{RuleAction, RuleTrigger, TriggerRule};
use parley_core::ParleyError;
use rusqlite::params;
use tracing::error;

use crate::database::{map_tr_err, now_timestamp, Database};
use crate::models::{new_id, to_json, RuleTriggerRecord};

/// Raw row; decoded outside the connection thread so one bad rule can be skipped.
struct RuleRow {
    id: String,
    name: String,
    channel_binding_id: Option<String>,
    is_global: bool,
    is_active: bool,
    trigger_type: String,
    trigger_config: String,
    priority: i64,
    actions: String,
    stop_propagation: bool,
}

impl RuleRow {
    fn decode(self) -> Result<TriggerRule, serde_json::Error> {
        let mut config: serde_json::Value = serde_json::from_str(&self.trigger_config)?;
        if let Some(fields) = config.as_object_mut() {
            fields.insert(
                "type".to_string(),
                serde_json::Value::String(self.trigger_type),
            );
        }
        let trigger: RuleTrigger = serde_json::from_value(config)?;
        let actions: Vec<RuleAction> = serde_json::from_str(&self.actions)?;
        Ok(TriggerRule {
            id: self.id,
            name: self.name,
            channel_binding_id: self.channel_binding_id,
            is_global: self.is_global,
            is_active: self.is_active,
            trigger,
            priority: self.priority,
            actions,
            stop_propagation: self.stop_propagation,
        })
    }
}

/// Split a trigger into its type tag and the remaining config document.
fn split_trigger(trigger: &RuleTrigger) -> rusqlite::Result<(String, String)> {
    let mut value = serde_json::to_value(trigger)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    if let Some(fields) = value.as_object_mut() {
        fields.remove("type");
    }
    Ok((trigger.kind().to_string(), value.to_string()))
}

/// Store a rule. An empty `id` is filled in.
pub async fn insert_rule(db: &Database, rule: &TriggerRule) -> Result<TriggerRule, ParleyError> {
    let mut record = rule.clone();
    if record.id.is_empty() {
        record.id = new_id();
    }
    let row = record.clone();
    let created_at = now_timestamp();
    db.connection()
        .call(move |conn| {
            let (trigger_type, trigger_config) = split_trigger(&row.trigger)?;
            conn.execute(
                "INSERT INTO trigger_rules (id, name, channel_binding_id, is_global, is_active,
                     trigger_type, trigger_config, priority, actions, stop_propagation, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    row.id,
                    row.name,
                    row.channel_binding_id,
                    row.is_global,
                    row.is_active,
                    trigger_type,
                    trigger_config,
                    row.priority,
                    to_json(&row.actions)?,
                    row.stop_propagation,
                    created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(record)
}

/// Active rules that apply to a message on `binding_id`, highest priority first.
///
/// Global rules always apply. Rows whose trigger or actions cannot be decoded
/// are logged and left out.
pub async fn active_rules_for(
    db: &Database,
    binding_id: Option<&str>,
) -> Result<Vec<TriggerRule>, ParleyError> {
    let binding_id = binding_id.map(str::to_string);
    let rows = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, channel_binding_id, is_global, is_active, trigger_type,
                        trigger_config, priority, actions, stop_propagation
                 FROM trigger_rules
                 WHERE is_active = 1 AND (is_global = 1 OR channel_binding_id = ?1)
                 ORDER BY priority DESC, created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![binding_id], |row| {
                Ok(RuleRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    channel_binding_id: row.get(2)?,
                    is_global: row.get(3)?,
                    is_active: row.get(4)?,
                    trigger_type: row.get(5)?,
                    trigger_config: row.get(6)?,
                    priority: row.get(7)?,
                    actions: row.get(8)?,
                    stop_propagation: row.get(9)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)?;

    let mut rules = Vec::with_capacity(rows.len());
    for row in rows {
        let rule_id = row.id.clone();
        match row.decode() {
            Ok(rule) => rules.push(rule),
            Err(e) => error!(rule_id = %rule_id, error = %e, "skipping malformed trigger rule"),
        }
    }
    Ok(rules)
}

/// Record that a rule fired for a message.
pub async fn record_rule_trigger(
    db: &Database,
    conversation_id: &str,
    rule_id: &str,
    message_id: Option<&str>,
) -> Result<RuleTriggerRecord, ParleyError> {
    let record = RuleTriggerRecord {
        id: new_id(),
        conversation_id: conversation_id.to_string(),
        rule_id: rule_id.to_string(),
        message_id: message_id.map(str::to_string),
        created_at: now_timestamp(),
    };
    let row = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversation_rule_triggers (id, conversation_id, rule_id, message_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![row.id, row.conversation_id, row.rule_id, row.message_id, row.created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(record)
}

/// Fired-rule audit entries for a conversation, oldest first.
pub async fn list_rule_triggers(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<RuleTriggerRecord>, ParleyError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, rule_id, message_id, created_at
                 FROM conversation_rule_triggers WHERE conversation_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![conversation_id], |row| {
                Ok(RuleTriggerRecord {
                    id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    rule_id: row.get(2)?,
                    message_id: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::ConversationStatus;

    fn rule(name: &str, priority: i64, binding: Option<&str>) -> TriggerRule {
        TriggerRule {
            id: String::new(),
            name: name.to_string(),
            channel_binding_id: binding.map(str::to_string),
            is_global: binding.is_none(),
            is_active: true,
            trigger: RuleTrigger::Regex {
                pattern: "precio|costo".to_string(),
                flags: Some("i".to_string()),
            },
            priority,
            actions: vec![RuleAction::SetStatus {
                status: ConversationStatus::Review,
            }],
            stop_propagation: false,
        }
    }

    #[tokio::test]
    async fn scoped_rules_in_priority_order() {
        let db = Database::open_in_memory().await.unwrap();
        insert_rule(&db, &rule("low-global", 1, None)).await.unwrap();
        insert_rule(&db, &rule("high-global", 10, None)).await.unwrap();
        // Bound rules need a real binding row for the foreign key.
        db.connection()
            .call(|conn| {
                conn.execute(
                    "INSERT INTO channel_bindings (id, platform, account_reference, created_at)
                     VALUES ('b1', 'whatsapp', '5512345678', '2026-01-01T00:00:00.000Z'),
                            ('b2', 'whatsapp', '5587654321', '2026-01-01T00:00:00.000Z')",
                    [],
                )
            })
            .await
            .unwrap();
        insert_rule(&db, &rule("bound-b1", 5, Some("b1"))).await.unwrap();
        insert_rule(&db, &rule("bound-b2", 7, Some("b2"))).await.unwrap();
        let mut inactive = rule("off", 99, None);
        inactive.is_active = false;
        insert_rule(&db, &inactive).await.unwrap();

        let names: Vec<String> = active_rules_for(&db, Some("b1"))
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["high-global", "bound-b1", "low-global"]);

        let global_only = active_rules_for(&db, None).await.unwrap();
        assert_eq!(global_only.len(), 2);
        assert_eq!(
            global_only[0].trigger,
            RuleTrigger::Regex {
                pattern: "precio|costo".to_string(),
                flags: Some("i".to_string())
            }
        );
    }

    #[tokio::test]
    async fn malformed_rule_is_skipped() {
        let db = Database::open_in_memory().await.unwrap();
        insert_rule(&db, &rule("good", 1, None)).await.unwrap();
        db.connection()
            .call(|conn| {
                conn.execute(
                    "INSERT INTO trigger_rules (id, name, is_global, trigger_type, trigger_config,
                         actions, created_at)
                     VALUES ('bad', 'bad', 1, 'keyword', '{\"keywords\":[\"x\"]}',
                         '[{\"type\":\"send_webhook\"}]', '2026-01-01T00:00:00.000Z')",
                    [],
                )
            })
            .await
            .unwrap();

        let rules = active_rules_for(&db, None).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "good");
    }
}
