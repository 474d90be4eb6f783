//! Distribution ledger for the cohort pipeline.
//!
//! Staged output waits here until a downstream consumer extracts it. This
//! crate provides:
//! - `NewDistributionRecord` / `DistributionRecord` with immutable business fields
//! - `DistributionWriter` / `DistributionReader` trait boundaries
//! - `InMemoryDistributionLedger` with atomic select-and-mark extraction
//! - Replay verification against the original extraction
//! - Integrity validation of the `(is_extracted, request_id)` pairs

pub mod error;
pub mod memory;
pub mod records;
pub mod replay;
pub mod traits;
pub mod validation;

pub use error::{LedgerError, LedgerResult};
pub use memory::InMemoryDistributionLedger;
pub use records::{DistributionRecord, Extraction, NewDistributionRecord};
pub use replay::{canonical_bytes, ReplayVerifier};
pub use traits::{DistributionLedger, DistributionReader, DistributionWriter};
pub use validation::{IntegrityReport, LedgerValidator, Violation, ViolationKind};
