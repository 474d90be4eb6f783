use async_trait::async_trait;
use cohort_types::{
    CohortRecord, DemographicSnapshot, FileId, FileStatus, GpPractice, ManagementSnapshot,
    ParticipantKey, ParticipantSnapshot, RawRecord, RecordStatus, ReferenceData,
};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// Row counts produced by a projection upsert.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Append-only storage of raw cohort records.
#[async_trait]
pub trait CohortStore: Send + Sync {
    /// Allocate the id for a newly ingested file.
    async fn next_file_id(&self) -> StoreResult<FileId>;

    /// Append raw records under `file_id`, returning them with their
    /// assigned ids. Either every record is appended or none is.
    async fn append_cohort(
        &self,
        file_id: FileId,
        records: Vec<RawRecord>,
    ) -> StoreResult<Vec<CohortRecord>>;

    /// All raw records of a file, in insertion order.
    async fn cohort_records(&self, file_id: FileId) -> StoreResult<Vec<CohortRecord>>;
}

/// Keyed demographic and management projections.
///
/// Keys are unique within each projection. Batch upserts are
/// all-or-nothing: a rejected batch leaves no partial writes.
#[async_trait]
pub trait ProjectionStore: Send + Sync {
    async fn demographic(&self, key: ParticipantKey) -> StoreResult<Option<DemographicSnapshot>>;

    async fn management(&self, key: ParticipantKey) -> StoreResult<Option<ManagementSnapshot>>;

    /// Both projections of a participant.
    ///
    /// The default reads each projection separately; backends that can
    /// read both consistently should override it.
    async fn snapshot(&self, key: ParticipantKey) -> StoreResult<ParticipantSnapshot> {
        let demographic = self.demographic(key).await?;
        let management = self.management(key).await?;
        Ok(ParticipantSnapshot::new(key, demographic, management))
    }

    async fn upsert_demographics(
        &self,
        batch: Vec<DemographicSnapshot>,
    ) -> StoreResult<UpsertSummary>;

    /// Upsert management rows. Newly inserted rows are assigned a
    /// `participant_id`; updates keep the existing one.
    async fn upsert_managements(&self, batch: Vec<ManagementSnapshot>)
        -> StoreResult<UpsertSummary>;
}

/// Per-file and per-record processing ledger.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Insert a new file status row. Fails if the id already has one.
    async fn insert_file_status(&self, status: FileStatus) -> StoreResult<()>;

    /// Replace a file status row. Rejects updates that would clear a stage
    /// flag or move `current_stage` backwards.
    async fn update_file_status(&self, status: FileStatus) -> StoreResult<()>;

    async fn file_status(&self, file_id: FileId) -> StoreResult<Option<FileStatus>>;

    /// Insert or replace a record status row, rejecting regressions.
    async fn upsert_record_status(&self, status: RecordStatus) -> StoreResult<()>;

    /// Write several record status rows as one unit. Nothing is written if
    /// any row would regress.
    async fn upsert_record_statuses(&self, statuses: Vec<RecordStatus>) -> StoreResult<()>;

    async fn record_status(
        &self,
        file_id: FileId,
        key: ParticipantKey,
    ) -> StoreResult<Option<RecordStatus>>;

    /// Record status rows of a file, ordered by key.
    async fn record_statuses(&self, file_id: FileId) -> StoreResult<Vec<RecordStatus>>;
}

/// Read-mostly lookup data consumed by validation rules.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn reference_data(&self) -> StoreResult<ReferenceData>;

    /// Insert or replace practices by code, returning how many were written.
    async fn upsert_gp_practices(&self, practices: Vec<GpPractice>) -> StoreResult<usize>;
}

/// Everything the pipeline needs from its backing store.
pub trait PipelineStore: CohortStore + ProjectionStore + StatusStore + ReferenceStore {}

impl<T> PipelineStore for T where T: CohortStore + ProjectionStore + StatusStore + ReferenceStore {}
