use cohort_types::{DistributionId, RequestId};

use crate::error::LedgerError;
use crate::records::{DistributionRecord, Extraction, NewDistributionRecord};

/// Write boundary for the distribution ledger.
pub trait DistributionWriter: Send + Sync {
    /// Append records as not yet extracted, returning their ids in input
    /// order. No deduplication across calls.
    fn create(&self, records: Vec<NewDistributionRecord>)
        -> Result<Vec<DistributionId>, LedgerError>;

    /// Select unextracted records oldest first, up to `limit`, and mark them
    /// extracted under a fresh request id. Selection and marking are one
    /// atomic step.
    fn extract_new(&self, limit: Option<usize>) -> Result<Extraction, LedgerError>;
}

/// Read boundary for the distribution ledger.
pub trait DistributionReader: Send + Sync {
    /// Every record extracted under `request_id`, ordered by id.
    fn replay(&self, request_id: RequestId) -> Result<Vec<DistributionRecord>, LedgerError>;

    fn get(&self, id: DistributionId) -> Result<Option<DistributionRecord>, LedgerError>;

    /// Number of records not yet extracted.
    fn pending_count(&self) -> Result<usize, LedgerError>;

    /// Request ids of every extraction that handed off at least one record,
    /// oldest first.
    fn request_ids(&self) -> Result<Vec<RequestId>, LedgerError>;

    /// Every record, ordered by id.
    fn records(&self) -> Result<Vec<DistributionRecord>, LedgerError>;
}

/// Both halves of the ledger.
pub trait DistributionLedger: DistributionWriter + DistributionReader {}

impl<T: DistributionWriter + DistributionReader> DistributionLedger for T {}
