use crate::error::ValidationError;
use crate::rule::{RuleInput, Severity, ValidationResult, ValidationRule};
use crate::rules::{is_missing, NO_DEMOGRAPHIC};

/// Post code presence and a loose length check. Problems are warnings.
pub struct PostcodePresentRule {
    min_len: usize,
    max_len: usize,
}

impl PostcodePresentRule {
    pub fn new(min_len: usize, max_len: usize) -> Self {
        Self { min_len, max_len }
    }
}

impl Default for PostcodePresentRule {
    fn default() -> Self {
        Self::new(5, 8)
    }
}

impl ValidationRule for PostcodePresentRule {
    fn name(&self) -> &str {
        "postcode_present"
    }

    fn description(&self) -> &str {
        "Post code should be present with a plausible length"
    }

    fn evaluate(&self, input: &RuleInput) -> Result<ValidationResult, ValidationError> {
        let Some(demographic) = input.demographic() else {
            return Ok(ValidationResult::fail(self.name(), Severity::Error, NO_DEMOGRAPHIC));
        };
        let post_code = demographic.post_code.as_deref();
        let Some(post_code) = post_code.filter(|_| !is_missing(post_code)) else {
            return Ok(ValidationResult::fail(
                self.name(),
                Severity::Warning,
                "Postcode is missing",
            ));
        };

        // Length is measured on the value as stored, surrounding spaces included.
        let len = post_code.chars().count();
        if len < self.min_len || len > self.max_len {
            return Ok(ValidationResult::fail(
                self.name(),
                Severity::Warning,
                format!("Postcode '{post_code}' has unusual length"),
            ));
        }
        Ok(ValidationResult::pass(
            self.name(),
            format!("Postcode '{post_code}' is present"),
        ))
    }
}
