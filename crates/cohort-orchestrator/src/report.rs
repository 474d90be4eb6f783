use cohort_transform::TransformationOutcome;
use cohort_types::{FileId, Stage};
use cohort_validation::{ParticipantValidation, Severity};
use serde::{Deserialize, Serialize};

/// Result of processing one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessFileReport {
    pub file_id: FileId,
    pub filename: String,
    pub content_hash: String,
    pub total_records: u64,
    /// Distinct keyed participants carried through the record stages.
    pub records_processed: u64,
    /// Rows without a usable key.
    pub records_skipped: u64,
    pub records_passed: u64,
    pub records_failed: u64,
    pub records_distributed: u64,
    pub exceptions_created: u64,
    pub stages_completed: Vec<Stage>,
    pub current_stage: Stage,
    pub is_complete: bool,
    pub has_errors: bool,
}

/// A single rule failure that stops a record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub rule_name: String,
    pub message: String,
    pub severity: Severity,
}

impl RecordFailure {
    /// Only `Error` failures are recorded as exceptions.
    pub fn raises_exception(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// What a record-granular stage concluded about one record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    Passed,
    Failed { failures: Vec<RecordFailure> },
}

impl RecordOutcome {
    pub fn failed(rule_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            failures: vec![RecordFailure {
                rule_name: rule_name.into(),
                message: message.into(),
                severity: Severity::Error,
            }],
        }
    }

    /// Every failed validation result, `Error` or `Warning`, fails the record.
    pub fn of_validation(validation: &ParticipantValidation) -> Self {
        Self::from_failures(
            validation
                .failures()
                .map(|result| RecordFailure {
                    rule_name: result.rule_name.clone(),
                    message: result.message.clone(),
                    severity: result.severity,
                })
                .collect(),
        )
    }

    /// Rules that could not be applied become failures.
    pub fn of_transformation(outcome: &TransformationOutcome) -> Self {
        Self::from_failures(
            outcome
                .results()
                .filter(|result| result.is_error())
                .map(|result| RecordFailure {
                    rule_name: result.rule_name.clone(),
                    message: result
                        .error
                        .clone()
                        .unwrap_or_else(|| result.message.clone()),
                    severity: Severity::Error,
                })
                .collect(),
        )
    }

    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub fn failures(&self) -> &[RecordFailure] {
        match self {
            Self::Passed => &[],
            Self::Failed { failures } => failures,
        }
    }

    fn from_failures(failures: Vec<RecordFailure>) -> Self {
        if failures.is_empty() {
            Self::Passed
        } else {
            Self::Failed { failures }
        }
    }
}

#[cfg(test)]
mod tests {
    use cohort_types::ParticipantKey;
    use cohort_validation::ValidationResult;

    use super::*;

    #[test]
    fn a_warning_fails_the_record_without_an_exception() {
        let validation = ParticipantValidation::new(
            ParticipantKey::new(1),
            vec![
                ValidationResult::pass("a", "ok"),
                ValidationResult::fail("b", Severity::Warning, "odd postcode"),
                ValidationResult::fail("c", Severity::Info, "no provider"),
            ],
        );
        let outcome = RecordOutcome::of_validation(&validation);
        assert!(!outcome.passed());
        assert_eq!(outcome.failures().len(), 1);
        assert_eq!(outcome.failures()[0].rule_name, "b");
        assert!(!outcome.failures()[0].raises_exception());
    }

    #[test]
    fn failures_keep_rule_order() {
        let validation = ParticipantValidation::new(
            ParticipantKey::new(1),
            vec![
                ValidationResult::fail("first", Severity::Error, "missing name"),
                ValidationResult::fail("second", Severity::Warning, "w"),
                ValidationResult::rule_failure("third", "store offline"),
            ],
        );
        let outcome = RecordOutcome::of_validation(&validation);
        let names: Vec<_> = outcome.failures().iter().map(|f| f.rule_name.as_str()).collect();
        assert_eq!(names, ["first", "second", "third"]);
        let raising: Vec<_> = outcome
            .failures()
            .iter()
            .filter(|f| f.raises_exception())
            .map(|f| f.rule_name.as_str())
            .collect();
        assert_eq!(raising, ["first", "third"]);
        assert!(outcome.failures()[2].message.contains("store offline"));
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(RecordOutcome::failed("stage", "boom")).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["failures"][0]["rule_name"], "stage");
        assert_eq!(
            serde_json::to_value(RecordOutcome::Passed).unwrap()["outcome"],
            "passed"
        );
    }
}
