use cohort_store::StoreError;
use cohort_types::{ParticipantKey, TypeError};

/// Errors produced by the transformation engine.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// Neither projection exists for the key.
    #[error("participant not found: {0}")]
    NotFound(ParticipantKey),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A rule definition addresses unknown fields or carries ill-typed
    /// values. Raised when the rule is registered, not when it runs.
    #[error("invalid rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("field error: {0}")]
    Field(#[from] TypeError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl TransformError {
    pub fn invalid_rule(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias for transformation operations.
pub type TransformResult<T> = Result<T, TransformError>;
