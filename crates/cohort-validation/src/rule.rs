use std::fmt;
use std::sync::Arc;

use cohort_types::{
    DemographicSnapshot, ManagementSnapshot, ParticipantKey, ParticipantSnapshot, ReferenceData,
};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// How a rule result affects the participant.
///
/// Any failed `Error` or `Warning` fails the participant. Only a failed
/// `Error` is blocking and sets `has_errors`. `Info` results always pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "ERROR"),
            Self::Warning => write!(f, "WARNING"),
            Self::Info => write!(f, "INFO"),
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationResult
// ---------------------------------------------------------------------------

/// Outcome of one rule for one participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub rule_name: String,
    pub passed: bool,
    pub message: String,
    pub severity: Severity,
}

impl ValidationResult {
    /// A passing `Info` result.
    pub fn pass(rule_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_name: rule_name.into(),
            passed: true,
            message: message.into(),
            severity: Severity::Info,
        }
    }

    /// A failed result. `Info` severity is promoted to passed.
    pub fn fail(
        rule_name: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            passed: severity == Severity::Info,
            message: message.into(),
            severity,
        }
    }

    /// Report the result under the name its rule was registered with.
    pub(crate) fn named(mut self, rule_name: impl Into<String>) -> Self {
        self.rule_name = rule_name.into();
        self
    }

    /// Synthetic result standing in for a rule that errored or panicked.
    pub fn rule_failure(rule_name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::fail(
            rule_name,
            Severity::Error,
            format!("Rule execution failed: {reason}"),
        )
    }

    /// `true` for a failed `Error`.
    pub fn is_blocking(&self) -> bool {
        !self.passed && self.severity == Severity::Error
    }

    /// `true` for a failed `Warning`.
    pub fn is_warning(&self) -> bool {
        !self.passed && self.severity == Severity::Warning
    }
}

// ---------------------------------------------------------------------------
// ValidationSummary
// ---------------------------------------------------------------------------

/// Counts over one participant's results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub has_errors: bool,
    pub has_warnings: bool,
}

impl ValidationSummary {
    pub fn from_results(results: &[ValidationResult]) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        let errors = results.iter().filter(|r| r.is_blocking()).count();
        let warnings = results.iter().filter(|r| r.is_warning()).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            errors,
            warnings,
            has_errors: errors > 0,
            has_warnings: warnings > 0,
        }
    }
}

// ---------------------------------------------------------------------------
// RuleInput
// ---------------------------------------------------------------------------

/// Everything a rule may look at. Shared read-only between concurrently
/// running rules.
#[derive(Clone, Debug)]
pub struct RuleInput {
    pub snapshot: ParticipantSnapshot,
    pub reference: Arc<ReferenceData>,
}

impl RuleInput {
    pub fn new(snapshot: ParticipantSnapshot, reference: Arc<ReferenceData>) -> Self {
        Self {
            snapshot,
            reference,
        }
    }

    pub fn key(&self) -> ParticipantKey {
        self.snapshot.key
    }

    pub fn demographic(&self) -> Option<&DemographicSnapshot> {
        self.snapshot.demographic.as_ref()
    }

    pub fn management(&self) -> Option<&ManagementSnapshot> {
        self.snapshot.management.as_ref()
    }
}

// ---------------------------------------------------------------------------
// ValidationRule trait
// ---------------------------------------------------------------------------

/// A single business rule.
///
/// Rules are pure functions of their input: no I/O, no blocking, no
/// mutation. The trait is object-safe and `Send + Sync` so rules can be
/// shared with spawned tasks as `Arc<dyn ValidationRule>`.
pub trait ValidationRule: Send + Sync {
    /// Stable rule name, reported on every result.
    fn name(&self) -> &str;

    /// One-line description, carried onto exception entries.
    fn description(&self) -> &str {
        ""
    }

    fn evaluate(&self, input: &RuleInput) -> Result<ValidationResult, ValidationError>;
}
