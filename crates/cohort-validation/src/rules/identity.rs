use crate::error::ValidationError;
use crate::rule::{RuleInput, Severity, ValidationResult, ValidationRule};

/// Both projections, where present, must carry a non-blank key.
pub struct NhsNumberPresentRule;

impl ValidationRule for NhsNumberPresentRule {
    fn name(&self) -> &str {
        "nhs_number_present"
    }

    fn description(&self) -> &str {
        "NHS number must be present on every record"
    }

    fn evaluate(&self, input: &RuleInput) -> Result<ValidationResult, ValidationError> {
        let demographic = input.demographic();
        let management = input.management();

        if demographic.is_none() && management.is_none() {
            return Ok(ValidationResult::fail(
                self.name(),
                Severity::Error,
                "No demographic or participant management record found",
            ));
        }
        if demographic.is_some_and(|d| d.nhs_number.is_blank()) {
            return Ok(ValidationResult::fail(
                self.name(),
                Severity::Error,
                "NHS number missing from demographic record",
            ));
        }
        if management.is_some_and(|m| m.nhs_number.is_blank()) {
            return Ok(ValidationResult::fail(
                self.name(),
                Severity::Error,
                "NHS number missing from participant management record",
            ));
        }
        Ok(ValidationResult::pass(
            self.name(),
            "NHS number present in all records",
        ))
    }
}

/// The demographic and management keys must agree. Skipped (passing) unless
/// both projections exist.
pub struct NhsNumberConsistencyRule;

impl ValidationRule for NhsNumberConsistencyRule {
    fn name(&self) -> &str {
        "nhs_number_consistency"
    }

    fn description(&self) -> &str {
        "NHS number must match across demographic and management records"
    }

    fn evaluate(&self, input: &RuleInput) -> Result<ValidationResult, ValidationError> {
        let (Some(demographic), Some(management)) = (input.demographic(), input.management())
        else {
            return Ok(ValidationResult::pass(
                self.name(),
                "Skipped - not both records present",
            ));
        };

        if demographic.nhs_number == management.nhs_number {
            Ok(ValidationResult::pass(
                self.name(),
                format!(
                    "NHS number {} is consistent across records",
                    demographic.nhs_number
                ),
            ))
        } else {
            Ok(ValidationResult::fail(
                self.name(),
                Severity::Error,
                format!(
                    "NHS number mismatch: demographic={}, management={}",
                    demographic.nhs_number, management.nhs_number
                ),
            ))
        }
    }
}
