use crate::error::ValidationError;
use crate::rule::{RuleInput, Severity, ValidationResult, ValidationRule};
use crate::rules::{is_missing, NO_DEMOGRAPHIC};

pub struct NamePresentRule;

impl ValidationRule for NamePresentRule {
    fn name(&self) -> &str {
        "name_present"
    }

    fn description(&self) -> &str {
        "Given name and family name are required"
    }

    fn evaluate(&self, input: &RuleInput) -> Result<ValidationResult, ValidationError> {
        let Some(demographic) = input.demographic() else {
            return Ok(ValidationResult::fail(self.name(), Severity::Error, NO_DEMOGRAPHIC));
        };

        let mut missing = Vec::new();
        if is_missing(demographic.given_name.as_deref()) {
            missing.push("given name");
        }
        if is_missing(demographic.family_name.as_deref()) {
            missing.push("family name");
        }

        if missing.is_empty() {
            Ok(ValidationResult::pass(
                self.name(),
                "Given name and family name are present",
            ))
        } else {
            Ok(ValidationResult::fail(
                self.name(),
                Severity::Error,
                format!("Missing required name fields: {}", missing.join(", ")),
            ))
        }
    }
}
