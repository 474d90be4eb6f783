use cohort_types::{DistributionId, RequestId};

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// No records carry the request id.
    #[error("No records found for request_id {0}")]
    RequestNotFound(RequestId),

    #[error("distribution record not found: {0}")]
    RecordNotFound(DistributionId),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A replay did not reproduce its extraction.
    #[error("replay mismatch for request {request_id}: {reason}")]
    ReplayMismatch { request_id: RequestId, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("ledger lock poisoned")]
    Poisoned,
}

pub type LedgerResult<T> = Result<T, LedgerError>;
