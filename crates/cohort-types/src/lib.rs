//! Foundation types for the cohort screening pipeline.
//!
//! This crate provides the identity, record and status types shared by every
//! other `cohort-*` crate.
//!
//! # Key Types
//!
//! - [`ParticipantKey`]: natural identifier of a person record (NHS number)
//! - [`FieldValue`]: dynamically typed value used by raw records and rule definitions
//! - [`ParticipantSnapshot`]: demographic and management projections of one participant
//! - [`CohortRecord`]: immutable raw record tagged with its file
//! - [`FileStatus`] / [`RecordStatus`]: forward-only processing ledger rows
//! - [`RequestId`]: UUID v7 shared by one distribution extraction
//! - [`ContentHash`]: BLAKE3 digest used to reject re-ingested files

pub mod content;
pub mod error;
pub mod field;
pub mod identity;
pub mod record;
pub mod reference;
pub mod snapshot;
pub mod status;

pub use content::ContentHash;
pub use error::TypeError;
pub use field::{FieldType, FieldValue};
pub use identity::{
    DistributionId, ExceptionId, FileId, ParticipantId, ParticipantKey, RecordId, RequestId,
};
pub use record::{key_of, CohortRecord, RawRecord, KEY_COLUMN};
pub use reference::{GpPractice, ReferenceData, SEED_PRACTICE_CODES};
pub use snapshot::{
    DemographicSnapshot, FieldRef, ManagementSnapshot, ParticipantSnapshot, SubRecord,
};
pub use status::{FileStatus, RecordStatus, Stage};
