use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid participant key: {0}")]
    InvalidKey(String),

    #[error("invalid request id: {0}")]
    InvalidRequestId(String),

    #[error("unknown field '{field}' on {record}")]
    UnknownField { record: &'static str, field: String },

    #[error("field '{field}' expects {expected}, got {actual}")]
    FieldType {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("field '{0}' is read-only")]
    ReadOnlyField(String),

    #[error("stage regression: {from} cannot move back to {to}")]
    StageRegression { from: String, to: String },

    #[error("unknown stage: {0}")]
    UnknownStage(String),
}
