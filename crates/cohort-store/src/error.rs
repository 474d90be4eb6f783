use cohort_types::{FileId, ParticipantKey, TypeError};

/// Errors from snapshot store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No file status row exists for the id.
    #[error("file not found: {0}")]
    FileNotFound(FileId),

    /// No record status row exists for the (file, key) pair.
    #[error("record status not found: file {file_id}, key {key}")]
    RecordNotFound { file_id: FileId, key: ParticipantKey },

    /// A row with the same identity already exists.
    #[error("duplicate entry: {0}")]
    Duplicate(String),

    /// An update would move a status row backwards.
    #[error("status regression for {entity}: {reason}")]
    Regression { entity: String, reason: String },

    /// A write was rejected before touching any state.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("type error: {0}")]
    Type(#[from] TypeError),

    /// A writer panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,

    /// Storage backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
