use crate::error::ValidationError;
use crate::rule::{RuleInput, Severity, ValidationResult, ValidationRule};
use crate::rules::{is_missing, NO_DEMOGRAPHIC};

/// Checks the registered GP practice against reference data.
///
/// An empty practice passes with `Info`; an unknown one is an `Error`.
pub struct PrimaryCareProviderRule;

impl ValidationRule for PrimaryCareProviderRule {
    fn name(&self) -> &str {
        "primary_care_provider_exists"
    }

    fn description(&self) -> &str {
        "Primary care provider must exist in the GP practice dataset"
    }

    fn evaluate(&self, input: &RuleInput) -> Result<ValidationResult, ValidationError> {
        let Some(demographic) = input.demographic() else {
            return Ok(ValidationResult::fail(self.name(), Severity::Error, NO_DEMOGRAPHIC));
        };
        let provider = demographic.primary_care_provider.as_deref();
        let Some(code) = provider.filter(|_| !is_missing(provider)) else {
            return Ok(ValidationResult::pass(
                self.name(),
                "No primary care provider specified",
            ));
        };

        if input.reference.has_practice(code) {
            Ok(ValidationResult::pass(
                self.name(),
                format!("Primary care provider {code} exists in GP Practice dataset"),
            ))
        } else {
            Ok(ValidationResult::fail(
                self.name(),
                Severity::Error,
                format!("Primary care provider {code} not found in GP Practice dataset"),
            ))
        }
    }
}
