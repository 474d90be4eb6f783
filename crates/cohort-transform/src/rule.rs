use cohort_types::{
    DemographicSnapshot, FieldRef, FieldValue, ManagementSnapshot, ParticipantKey,
    ParticipantSnapshot, SubRecord,
};
use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::error::{TransformError, TransformResult};

/// The disconnected copy rules mutate. Never written back by the engine.
pub type WorkingCopy = ParticipantSnapshot;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// One field overwritten by a rule, addressed as `demographic.post_code`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: FieldValue,
    pub new: FieldValue,
}

/// What a single rule did to the working copy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule_name: String,
    pub applied: bool,
    pub changes: Vec<FieldChange>,
    pub message: String,
    /// Set when the rule could not be applied; the working copy is left as
    /// it was before the rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RuleOutcome {
    fn skipped(rule_name: &str, message: impl Into<String>) -> Self {
        Self {
            rule_name: rule_name.to_string(),
            applied: false,
            changes: Vec::new(),
            message: message.into(),
            error: None,
        }
    }

    pub fn failed(rule_name: &str, error: &TransformError) -> Self {
        Self {
            rule_name: rule_name.to_string(),
            applied: false,
            changes: Vec::new(),
            message: "Rule execution failed".to_string(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

// ---------------------------------------------------------------------------
// Rule definitions
// ---------------------------------------------------------------------------

/// Overwrite one field with a fixed value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub field: FieldRef,
    pub value: FieldValue,
}

impl FieldUpdate {
    pub fn new(field: FieldRef, value: impl Into<FieldValue>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}

/// When `condition` holds, apply every update.
///
/// Updates addressing an absent sub-record are skipped and not recorded.
/// Each applied update is recorded, even when the value was already equal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalRule {
    pub name: String,
    pub condition: Condition,
    pub updates: Vec<FieldUpdate>,
}

impl ConditionalRule {
    pub fn new(name: impl Into<String>, condition: Condition, updates: Vec<FieldUpdate>) -> Self {
        Self {
            name: name.into(),
            condition,
            updates,
        }
    }

    pub fn apply(&self, working: &mut WorkingCopy) -> TransformResult<RuleOutcome> {
        if !self.condition.evaluate(working) {
            return Ok(RuleOutcome::skipped(&self.name, "Condition not met"));
        }

        // Stage on a copy so a failing update leaves the working copy intact.
        let mut staged = working.clone();
        let mut changes = Vec::new();
        for update in &self.updates {
            if let Some(old) = staged.set(&update.field, update.value.clone())? {
                changes.push(FieldChange {
                    field: update.field.to_string(),
                    old,
                    new: update.value.clone(),
                });
            }
        }
        *working = staged;

        Ok(RuleOutcome {
            rule_name: self.name.clone(),
            applied: true,
            message: format!("Applied {} field updates", changes.len()),
            changes,
            error: None,
        })
    }
}

/// Substring replacements applied in order to text fields.
///
/// Non-text fields are left alone. A field is recorded only when its final
/// value differs from the original.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementRule {
    pub name: String,
    pub replacements: Vec<(String, String)>,
    pub fields: Vec<FieldRef>,
}

impl ReplacementRule {
    pub fn new(
        name: impl Into<String>,
        replacements: &[(&str, &str)],
        fields: Vec<FieldRef>,
    ) -> Self {
        Self {
            name: name.into(),
            replacements: replacements
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            fields,
        }
    }

    fn replace_all(&self, value: &str) -> String {
        self.replacements
            .iter()
            .fold(value.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to))
    }

    pub fn apply(&self, working: &mut WorkingCopy) -> TransformResult<RuleOutcome> {
        let mut staged = working.clone();
        let mut changes = Vec::new();
        for field in &self.fields {
            let Some(FieldValue::Text(old)) = staged.get(field) else {
                continue;
            };
            let new = self.replace_all(&old);
            if new != old {
                staged.set(field, FieldValue::Text(new.clone()))?;
                changes.push(FieldChange {
                    field: field.to_string(),
                    old: FieldValue::Text(old),
                    new: FieldValue::Text(new),
                });
            }
        }
        *working = staged;

        let message = if changes.is_empty() {
            "No changes needed".to_string()
        } else {
            format!("Applied replacements to {} fields", changes.len())
        };
        Ok(RuleOutcome {
            rule_name: self.name.clone(),
            applied: !changes.is_empty(),
            changes,
            message,
            error: None,
        })
    }
}

// ---------------------------------------------------------------------------
// TransformationRule
// ---------------------------------------------------------------------------

/// The two rule kinds behind one `apply` operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformationRule {
    Conditional(ConditionalRule),
    Replacement(ReplacementRule),
}

impl TransformationRule {
    pub fn name(&self) -> &str {
        match self {
            Self::Conditional(rule) => &rule.name,
            Self::Replacement(rule) => &rule.name,
        }
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self, Self::Conditional(_))
    }

    pub fn apply(&self, working: &mut WorkingCopy) -> TransformResult<RuleOutcome> {
        match self {
            Self::Conditional(rule) => rule.apply(working),
            Self::Replacement(rule) => rule.apply(working),
        }
    }

    /// Reject definitions that could never apply cleanly: unknown fields,
    /// ill-typed update values, empty match strings.
    pub fn check(&self) -> TransformResult<()> {
        let name = self.name();
        if name.trim().is_empty() {
            return Err(TransformError::invalid_rule(name, "rule name is empty"));
        }
        match self {
            Self::Conditional(rule) => {
                for field in rule.condition.fields() {
                    check_field(name, field)?;
                }
                let mut probe = probe_snapshot();
                for update in &rule.updates {
                    check_field(name, &update.field)?;
                    probe
                        .set(&update.field, update.value.clone())
                        .map_err(|e| TransformError::invalid_rule(name, e.to_string()))?;
                }
            }
            Self::Replacement(rule) => {
                if rule.replacements.iter().any(|(from, _)| from.is_empty()) {
                    return Err(TransformError::invalid_rule(name, "empty match string"));
                }
                for field in &rule.fields {
                    check_field(name, field)?;
                }
            }
        }
        Ok(())
    }
}

impl From<ConditionalRule> for TransformationRule {
    fn from(rule: ConditionalRule) -> Self {
        Self::Conditional(rule)
    }
}

impl From<ReplacementRule> for TransformationRule {
    fn from(rule: ReplacementRule) -> Self {
        Self::Replacement(rule)
    }
}

fn probe_snapshot() -> ParticipantSnapshot {
    let key = ParticipantKey::new(1);
    ParticipantSnapshot::new(
        key,
        Some(DemographicSnapshot::new(key)),
        Some(ManagementSnapshot::new(key)),
    )
}

fn check_field(rule: &str, field: &FieldRef) -> TransformResult<()> {
    let known = match field.record {
        SubRecord::Demographic => DemographicSnapshot::FIELDS,
        SubRecord::Management => ManagementSnapshot::FIELDS,
    };
    if known.contains(&field.field.as_str()) {
        Ok(())
    } else {
        Err(TransformError::invalid_rule(rule, format!("unknown field {field}")))
    }
}
