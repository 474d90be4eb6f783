use cohort_exceptions::ExceptionError;
use cohort_ledger::LedgerError;
use cohort_store::StoreError;
use cohort_transform::TransformError;
use cohort_types::{FileId, Stage, TypeError};
use cohort_validation::ValidationError;
use thiserror::Error;

/// Errors surfaced by the pipeline.
///
/// Record-level validation and transformation failures are never errors;
/// they are captured on the record's status and as exception entries.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A file, participant, status row or request id is absent.
    #[error("{0}")]
    NotFound(String),

    /// Empty or malformed input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    /// The exact file content was ingested before.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A whole-file stage failed. The file is marked `has_errors` and
    /// processing stops.
    #[error("{stage} failed for file {file_id}: {reason}")]
    FatalStage {
        stage: Stage,
        file_id: FileId,
        reason: String,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("type error: {0}")]
    Type(#[from] TypeError),

    #[error("validation error: {0}")]
    Validation(ValidationError),

    #[error("transformation error: {0}")]
    Transform(TransformError),

    #[error("exception sink error: {0}")]
    Exception(ExceptionError),

    #[error("ledger error: {0}")]
    Ledger(LedgerError),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// `true` for errors caused by the caller rather than the pipeline.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::InvalidInput(_) | Self::UnsupportedType(_) | Self::Conflict(_)
        )
    }
}

impl From<ValidationError> for PipelineError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::NotFound(_) => Self::NotFound(err.to_string()),
            ValidationError::InvalidInput(msg) => Self::InvalidInput(msg),
            other => Self::Validation(other),
        }
    }
}

impl From<TransformError> for PipelineError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::NotFound(_) => Self::NotFound(err.to_string()),
            TransformError::InvalidInput(msg) => Self::InvalidInput(msg),
            TransformError::InvalidRule { .. } => Self::Config(err.to_string()),
            other => Self::Transform(other),
        }
    }
}

impl From<ExceptionError> for PipelineError {
    fn from(err: ExceptionError) -> Self {
        match err {
            ExceptionError::NotFound(_) => Self::NotFound(err.to_string()),
            ExceptionError::InvalidInput(msg) => Self::InvalidInput(msg),
            other => Self::Exception(other),
        }
    }
}

impl From<LedgerError> for PipelineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::RequestNotFound(_) | LedgerError::RecordNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            LedgerError::InvalidInput(msg) => Self::InvalidInput(msg),
            other => Self::Ledger(other),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
