//! Snapshot store for the cohort pipeline.
//!
//! The store is the pipeline's only shared mutable resource. It holds the
//! append-only raw cohort records, the keyed demographic and management
//! projections, the per-file and per-record processing ledger, and the
//! reference data read by validation rules.
//!
//! # Traits
//!
//! - [`CohortStore`]: raw records, range-scanned by file id
//! - [`ProjectionStore`]: point reads and all-or-nothing batch upserts by key
//! - [`StatusStore`]: forward-only file and record status rows
//! - [`ReferenceStore`]: GP practice lookup data
//!
//! [`PipelineStore`] bundles all four. [`InMemoryStore`] implements them
//! for tests, the CLI and embedding.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use traits::{
    CohortStore, PipelineStore, ProjectionStore, ReferenceStore, StatusStore, UpsertSummary,
};
