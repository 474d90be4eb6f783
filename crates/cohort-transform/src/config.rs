use serde::{Deserialize, Serialize};

use crate::defaults::{default_conditional_rules, default_replacement_rules};
use crate::error::TransformResult;
use crate::rule::{ConditionalRule, ReplacementRule, TransformationRule};

/// Rule sets handed to the transformation engine.
///
/// `Default` carries the built-in rules. A TOML or JSON file may replace
/// either list; an omitted list keeps its default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformationConfig {
    pub conditional_rules: Vec<ConditionalRule>,
    pub replacement_rules: Vec<ReplacementRule>,
}

impl Default for TransformationConfig {
    fn default() -> Self {
        Self {
            conditional_rules: default_conditional_rules(),
            replacement_rules: default_replacement_rules(),
        }
    }
}

impl TransformationConfig {
    /// No rules at all.
    pub fn empty() -> Self {
        Self {
            conditional_rules: Vec::new(),
            replacement_rules: Vec::new(),
        }
    }

    /// Conditional rules first, then replacement rules, each list in order.
    pub fn rules(&self) -> Vec<TransformationRule> {
        self.conditional_rules
            .iter()
            .cloned()
            .map(TransformationRule::from)
            .chain(self.replacement_rules.iter().cloned().map(TransformationRule::from))
            .collect()
    }

    pub fn check(&self) -> TransformResult<()> {
        self.rules().iter().try_for_each(TransformationRule::check)
    }
}
