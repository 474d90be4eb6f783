use cohort_store::StoreError;
use cohort_types::ParticipantKey;

/// Errors that can occur during validation.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Neither projection exists for the key.
    #[error("participant not found: {0}")]
    NotFound(ParticipantKey),

    /// A batch call was made with no keys.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A rule could not evaluate its input.
    #[error("rule '{rule}' failed: {message}")]
    Rule { rule: String, message: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ValidationError {
    /// Create a rule error with a name and message.
    pub fn rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rule {
            rule: rule.into(),
            message: message.into(),
        }
    }
}
