//! Orchestration for the cohort pipeline.
//!
//! [`OrchestrationEngine`] drives an ingested file through the fixed stage
//! sequence, calling the validation and transformation engines per record,
//! raising exceptions for failing records and staging the rest into the
//! distribution ledger. [`CohortService`] puts every pipeline operation
//! behind one handle for the server and CLI.

pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod loader;
pub mod report;
pub mod service;

pub use config::{DistributionSource, PipelineConfig};
pub use engine::OrchestrationEngine;
pub use error::{PipelineError, PipelineResult};
pub use ingest::{FileType, IngestedFile, IngestionGateway, InMemoryGateway, JsonFileGateway};
pub use report::{ProcessFileReport, RecordFailure, RecordOutcome};
pub use service::CohortService;

// Re-export the types callers need to drive the service.
pub use cohort_exceptions::{ExceptionEntry, NewException, Resolution};
pub use cohort_ledger::{DistributionRecord, Extraction, IntegrityReport, NewDistributionRecord};
pub use cohort_transform::{BatchTransformation, TransformationOutcome};
pub use cohort_types::{
    FieldValue, FileId, FileStatus, GpPractice, ParticipantKey, RawRecord, RecordStatus,
    ReferenceData, RequestId, Stage,
};
pub use cohort_validation::ParticipantValidation;
