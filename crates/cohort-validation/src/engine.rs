use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use cohort_store::{ProjectionStore, ReferenceStore};
use cohort_types::{ParticipantKey, ParticipantSnapshot, ReferenceData};
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::config::ValidationConfig;
use crate::error::ValidationError;
use crate::rule::{RuleInput, Severity, ValidationResult, ValidationRule, ValidationSummary};
use crate::rules::default_rules;

/// Rule name reported for a batch key with no projections.
pub const PARTICIPANT_EXISTS: &str = "participant_exists";

// ---------------------------------------------------------------------------
// ParticipantValidation
// ---------------------------------------------------------------------------

/// Ordered rule results for one participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantValidation {
    pub key: ParticipantKey,
    /// One result per registered rule, in registration order.
    pub results: Vec<ValidationResult>,
    pub summary: ValidationSummary,
}

impl ParticipantValidation {
    pub fn new(key: ParticipantKey, results: Vec<ValidationResult>) -> Self {
        let summary = ValidationSummary::from_results(&results);
        Self {
            key,
            results,
            summary,
        }
    }

    /// `true` when every result passed. A failed `Warning` fails the
    /// participant too, though it is not blocking.
    pub fn passed(&self) -> bool {
        self.summary.failed == 0
    }

    /// Failed results of any severity, in registration order.
    pub fn failures(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    /// Failed `Error` results.
    pub fn blocking(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| r.is_blocking())
    }
}

// ---------------------------------------------------------------------------
// ValidationEngine
// ---------------------------------------------------------------------------

/// Evaluates an ordered rule list against participants.
///
/// Each rule runs as its own task; results are re-sorted to registration
/// order before they are returned, so output never depends on which rule
/// finished first. A rule that errors or panics yields a synthetic `Error`
/// result under its own name and never affects its siblings.
pub struct ValidationEngine<S: ?Sized> {
    store: Arc<S>,
    rules: Vec<Arc<dyn ValidationRule>>,
    config: ValidationConfig,
}

impl<S> ValidationEngine<S>
where
    S: ProjectionStore + ReferenceStore + ?Sized,
{
    /// Create an engine with no rules. Use [`Self::add_rule`] to register
    /// rules, or [`Self::with_default_rules`] for the standard set.
    pub fn new(store: Arc<S>, config: ValidationConfig) -> Self {
        Self {
            store,
            rules: Vec::new(),
            config,
        }
    }

    /// Create an engine with the standard rules:
    /// primary care provider, NHS number present, NHS number consistency,
    /// name present, postcode present.
    pub fn with_default_rules(store: Arc<S>, config: ValidationConfig) -> Self {
        let mut engine = Self::new(store, config);
        for rule in default_rules(&engine.config) {
            engine.add_rule(rule);
        }
        engine
    }

    /// Append a rule to the end of the registration order.
    pub fn add_rule(&mut self, rule: Arc<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn rules(&self) -> &[Arc<dyn ValidationRule>] {
        &self.rules
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Registration position and description of a rule, by name.
    pub fn rule_info(&self, name: &str) -> Option<(usize, &str)> {
        self.rules
            .iter()
            .position(|r| r.name() == name)
            .map(|i| (i, self.rules[i].description()))
    }

    /// Validate one participant against every registered rule.
    ///
    /// Fails with `NotFound` when neither projection exists.
    pub async fn validate(
        &self,
        key: ParticipantKey,
    ) -> Result<ParticipantValidation, ValidationError> {
        self.validate_with(key, None).await
    }

    /// Validate one participant against the named subset of rules, kept in
    /// registration order. `None` runs every rule.
    pub async fn validate_with(
        &self,
        key: ParticipantKey,
        only: Option<&[String]>,
    ) -> Result<ParticipantValidation, ValidationError> {
        let rules = self.select(only)?;
        let snapshot = self.store.snapshot(key).await?;
        if snapshot.is_empty() {
            return Err(ValidationError::NotFound(key));
        }
        let reference = Arc::new(self.store.reference_data().await?);
        let input = RuleInput::new(snapshot, reference);
        let results = run_rules(&rules, input, self.config.parallel_rules).await;
        debug!(key = %key, rules = results.len(), "participant validated");
        Ok(ParticipantValidation::new(key, results))
    }

    /// Validate many participants concurrently.
    ///
    /// A key with no projections, or whose lookup fails, gets a single
    /// synthetic failed result instead of aborting the batch.
    pub async fn validate_batch(
        &self,
        keys: &[ParticipantKey],
    ) -> Result<BTreeMap<ParticipantKey, ParticipantValidation>, ValidationError> {
        if keys.is_empty() {
            return Err(ValidationError::InvalidInput(
                "batch must contain at least one key".into(),
            ));
        }
        let outcomes = join_all(keys.iter().map(|key| async move {
            let outcome = self.validate(*key).await;
            (*key, outcome)
        }))
        .await;

        Ok(outcomes
            .into_iter()
            .map(|(key, outcome)| {
                let validation = match outcome {
                    Ok(validation) => validation,
                    Err(ValidationError::NotFound(_)) => ParticipantValidation::new(
                        key,
                        vec![ValidationResult::fail(
                            PARTICIPANT_EXISTS,
                            Severity::Error,
                            format!("No participant found with NHS number {key}"),
                        )],
                    ),
                    Err(err) => {
                        warn!(key = %key, error = %err, "batch validation lookup failed");
                        ParticipantValidation::new(
                            key,
                            vec![ValidationResult::rule_failure(PARTICIPANT_EXISTS, err)],
                        )
                    }
                };
                (key, validation)
            })
            .collect())
    }

    /// Evaluate every rule against an already loaded snapshot. No store I/O.
    pub async fn evaluate(
        &self,
        snapshot: ParticipantSnapshot,
        reference: Arc<ReferenceData>,
    ) -> ParticipantValidation {
        let key = snapshot.key;
        let results = run_rules(
            &self.rules,
            RuleInput::new(snapshot, reference),
            self.config.parallel_rules,
        )
        .await;
        ParticipantValidation::new(key, results)
    }

    fn select(
        &self,
        only: Option<&[String]>,
    ) -> Result<Vec<Arc<dyn ValidationRule>>, ValidationError> {
        let Some(names) = only else {
            return Ok(self.rules.clone());
        };
        if let Some(unknown) = names
            .iter()
            .find(|n| !self.rules.iter().any(|r| r.name() == n.as_str()))
        {
            return Err(ValidationError::InvalidInput(format!("unknown rule: {unknown}")));
        }
        Ok(self
            .rules
            .iter()
            .filter(|r| names.iter().any(|n| n == r.name()))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Rule execution
// ---------------------------------------------------------------------------

async fn run_rules(
    rules: &[Arc<dyn ValidationRule>],
    input: RuleInput,
    parallel: bool,
) -> Vec<ValidationResult> {
    if !parallel {
        return rules.iter().map(|rule| run_inline(rule.as_ref(), &input)).collect();
    }

    let input = Arc::new(input);
    let mut pending: FuturesUnordered<_> = rules
        .iter()
        .enumerate()
        .map(|(index, rule)| {
            let name = rule.name().to_string();
            let rule = Arc::clone(rule);
            let input = Arc::clone(&input);
            let handle = tokio::spawn(async move { rule.evaluate(&input) });
            async move { (index, name, handle.await) }
        })
        .collect();

    // Fan in by completion, then restore registration order.
    let mut completed = Vec::with_capacity(rules.len());
    while let Some((index, name, joined)) = pending.next().await {
        let result = match joined {
            Ok(Ok(result)) => result.named(name),
            Ok(Err(err)) => {
                warn!(rule = %name, error = %err, "validation rule returned an error");
                ValidationResult::rule_failure(name, err)
            }
            Err(err) => {
                let reason = panic_reason(err);
                warn!(rule = %name, reason = %reason, "validation rule panicked");
                ValidationResult::rule_failure(name, reason)
            }
        };
        completed.push((index, result));
    }
    completed.sort_by_key(|(index, _)| *index);
    completed.into_iter().map(|(_, result)| result).collect()
}

fn run_inline(rule: &dyn ValidationRule, input: &RuleInput) -> ValidationResult {
    match catch_unwind(AssertUnwindSafe(|| rule.evaluate(input))) {
        Ok(Ok(result)) => result.named(rule.name()),
        Ok(Err(err)) => ValidationResult::rule_failure(rule.name(), err),
        Err(payload) => {
            ValidationResult::rule_failure(rule.name(), payload_text(payload.as_ref()))
        }
    }
}

fn panic_reason(err: JoinError) -> String {
    if err.is_panic() {
        payload_text(err.into_panic().as_ref())
    } else {
        err.to_string()
    }
}

fn payload_text(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "rule panicked".to_string())
}
