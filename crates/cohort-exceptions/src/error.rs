//! Error types for exception operations.

use cohort_types::ParticipantKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExceptionError {
    /// No unresolved exception exists for the key.
    #[error("No unresolved exceptions found for NHS number {0}")]
    NotFound(ParticipantKey),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("exception sink lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, ExceptionError>;
