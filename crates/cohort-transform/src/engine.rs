use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cohort_store::ProjectionStore;
use cohort_types::{ParticipantKey, ParticipantSnapshot};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::TransformationConfig;
use crate::error::{TransformError, TransformResult};
use crate::rule::{RuleOutcome, TransformationRule, WorkingCopy};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationSummary {
    pub total_rules: usize,
    /// Rules reporting `applied = true`.
    pub rules_applied: usize,
    /// Sum of changed-field counts across all rules.
    pub total_field_changes: usize,
    pub rules_failed: usize,
}

impl TransformationSummary {
    fn from_outcomes<'a>(outcomes: impl Iterator<Item = &'a RuleOutcome>) -> Self {
        outcomes.fold(Self::default(), |mut s, o| {
            s.total_rules += 1;
            s.rules_applied += usize::from(o.applied);
            s.total_field_changes += o.changes.len();
            s.rules_failed += usize::from(o.is_error());
            s
        })
    }
}

/// Inbound and outbound snapshots of one participant plus what each rule
/// did in between.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationOutcome {
    pub key: ParticipantKey,
    pub inbound: ParticipantSnapshot,
    pub outbound: ParticipantSnapshot,
    pub conditional_results: Vec<RuleOutcome>,
    pub replacement_results: Vec<RuleOutcome>,
    pub summary: TransformationSummary,
    pub transformed_at: DateTime<Utc>,
}

impl TransformationOutcome {
    /// `true` when some rule failed to apply.
    pub fn has_errors(&self) -> bool {
        self.summary.rules_failed > 0
    }

    pub fn results(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.conditional_results
            .iter()
            .chain(self.replacement_results.iter())
    }
}

/// Per-key entry of a batch transformation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformItem {
    Transformed(Box<TransformationOutcome>),
    Error { message: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTransformation {
    pub results: BTreeMap<ParticipantKey, TransformItem>,
    pub summary: BatchSummary,
}

// ---------------------------------------------------------------------------
// TransformationEngine
// ---------------------------------------------------------------------------

/// Applies conditional and replacement rules to a disconnected copy of a
/// participant's snapshot.
///
/// Conditional rules run first, in registration order, against one shared
/// working copy: a later rule observes the updates of an earlier one.
/// Replacement rules then run in registration order on the same copy. The
/// engine reads from the store but never writes to it.
pub struct TransformationEngine<S: ?Sized> {
    store: Arc<S>,
    rules: Vec<TransformationRule>,
}

impl<S> TransformationEngine<S>
where
    S: ProjectionStore + ?Sized,
{
    /// Create an engine with no rules.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            rules: Vec::new(),
        }
    }

    /// Create an engine from configured rule sets, rejecting invalid rules.
    pub fn from_config(store: Arc<S>, config: &TransformationConfig) -> TransformResult<Self> {
        let mut engine = Self::new(store);
        for rule in config.rules() {
            engine.add_rule(rule)?;
        }
        Ok(engine)
    }

    /// Create an engine with the built-in rule sets.
    pub fn with_default_rules(store: Arc<S>) -> TransformResult<Self> {
        Self::from_config(store, &TransformationConfig::default())
    }

    /// Register a rule after checking its definition.
    pub fn add_rule(&mut self, rule: impl Into<TransformationRule>) -> TransformResult<()> {
        let rule = rule.into();
        rule.check()?;
        self.rules.push(rule);
        Ok(())
    }

    pub fn rules(&self) -> &[TransformationRule] {
        &self.rules
    }

    /// Transform one participant from its persisted snapshot.
    ///
    /// Fails with `NotFound` only when neither projection exists.
    pub async fn transform(&self, key: ParticipantKey) -> TransformResult<TransformationOutcome> {
        let snapshot = self.store.snapshot(key).await?;
        if snapshot.is_empty() {
            return Err(TransformError::NotFound(key));
        }
        Ok(self.apply(&snapshot))
    }

    /// Transform many participants independently. Failures are captured
    /// per key; duplicate keys are transformed once.
    pub async fn transform_batch(
        &self,
        keys: &[ParticipantKey],
    ) -> TransformResult<BatchTransformation> {
        if keys.is_empty() {
            return Err(TransformError::InvalidInput(
                "batch must contain at least one key".into(),
            ));
        }
        let unique: BTreeSet<ParticipantKey> = keys.iter().copied().collect();
        let outcomes = join_all(
            unique
                .iter()
                .map(|key| async move { (*key, self.transform(*key).await) }),
        )
        .await;

        let mut summary = BatchSummary {
            total: unique.len(),
            ..BatchSummary::default()
        };
        let results = outcomes
            .into_iter()
            .map(|(key, outcome)| {
                let item = match outcome {
                    Ok(outcome) => {
                        summary.successful += 1;
                        TransformItem::Transformed(Box::new(outcome))
                    }
                    Err(err) => {
                        summary.failed += 1;
                        TransformItem::Error {
                            message: err.to_string(),
                        }
                    }
                };
                (key, item)
            })
            .collect();
        Ok(BatchTransformation { results, summary })
    }

    /// Run every rule over a copy of `snapshot`. Pure: no store access.
    pub fn apply(&self, snapshot: &ParticipantSnapshot) -> TransformationOutcome {
        let mut working: WorkingCopy = snapshot.clone();
        let conditional_results = self.run(&mut working, true);
        let replacement_results = self.run(&mut working, false);
        let summary = TransformationSummary::from_outcomes(
            conditional_results.iter().chain(replacement_results.iter()),
        );
        debug!(
            key = %snapshot.key,
            rules_applied = summary.rules_applied,
            field_changes = summary.total_field_changes,
            "participant transformed"
        );
        TransformationOutcome {
            key: snapshot.key,
            inbound: snapshot.clone(),
            outbound: working,
            conditional_results,
            replacement_results,
            summary,
            transformed_at: Utc::now(),
        }
    }

    fn run(&self, working: &mut WorkingCopy, conditional: bool) -> Vec<RuleOutcome> {
        self.rules
            .iter()
            .filter(|rule| rule.is_conditional() == conditional)
            .map(|rule| match rule.apply(working) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(rule = rule.name(), key = %working.key, error = %err, "transformation rule failed");
                    RuleOutcome::failed(rule.name(), &err)
                }
            })
            .collect()
    }
}
