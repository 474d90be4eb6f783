use std::collections::BTreeMap;
use std::sync::Arc;

use cohort_exceptions::{
    ExceptionEntry, ExceptionSink, InMemoryExceptionSink, NewException, Resolution,
};
use cohort_ledger::{
    DistributionLedger, DistributionRecord, Extraction, InMemoryDistributionLedger,
    IntegrityReport, LedgerValidator, NewDistributionRecord, ReplayVerifier,
};
use cohort_store::{InMemoryStore, PipelineStore};
use cohort_transform::{BatchTransformation, TransformationOutcome};
use cohort_types::{
    DistributionId, ExceptionId, FileId, FileStatus, GpPractice, ParticipantKey, RecordStatus,
    ReferenceData, RequestId,
};
use cohort_validation::ParticipantValidation;
use tracing::info;

use crate::config::PipelineConfig;
use crate::engine::OrchestrationEngine;
use crate::error::{PipelineError, PipelineResult};
use crate::ingest::{FileType, IngestionGateway};
use crate::report::ProcessFileReport;

/// Every pipeline operation behind one handle.
///
/// Single-entity calls surface `NotFound` and `InvalidInput` directly.
/// Batch calls answer per item and fail only on a malformed request.
pub struct CohortService {
    engine: OrchestrationEngine<dyn PipelineStore>,
}

impl CohortService {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        gateway: Arc<dyn IngestionGateway>,
        exceptions: Arc<dyn ExceptionSink>,
        ledger: Arc<dyn DistributionLedger>,
        config: PipelineConfig,
    ) -> PipelineResult<Self> {
        Ok(Self {
            engine: OrchestrationEngine::new(store, gateway, exceptions, ledger, config)?,
        })
    }

    /// A service over in-memory collaborators seeded with `reference`.
    pub fn in_memory(
        gateway: Arc<dyn IngestionGateway>,
        config: PipelineConfig,
        reference: ReferenceData,
    ) -> PipelineResult<Self> {
        Self::new(
            Arc::new(InMemoryStore::with_reference(reference)),
            gateway,
            Arc::new(InMemoryExceptionSink::new()),
            Arc::new(InMemoryDistributionLedger::new()),
            config,
        )
    }

    pub fn engine(&self) -> &OrchestrationEngine<dyn PipelineStore> {
        &self.engine
    }

    // ---- Orchestration ----

    pub async fn process_file(
        &self,
        path: &str,
        file_type: FileType,
    ) -> PipelineResult<ProcessFileReport> {
        self.engine.process_file(path, file_type).await
    }

    pub async fn file_status(&self, file_id: FileId) -> PipelineResult<FileStatus> {
        self.engine.file_status(file_id).await
    }

    pub async fn record_status(
        &self,
        file_id: FileId,
        key: ParticipantKey,
    ) -> PipelineResult<RecordStatus> {
        self.engine.record_status(file_id, key).await
    }

    /// Record statuses of a file, in key order.
    pub async fn record_statuses(&self, file_id: FileId) -> PipelineResult<Vec<RecordStatus>> {
        self.engine.file_status(file_id).await?;
        Ok(self.engine.store().record_statuses(file_id).await?)
    }

    // ---- Validation ----

    pub async fn validate(&self, key: ParticipantKey) -> PipelineResult<ParticipantValidation> {
        Ok(self.engine.validation().validate(key).await?)
    }

    /// Validate against a subset of rules, named in any order.
    pub async fn validate_with(
        &self,
        key: ParticipantKey,
        rules: &[String],
    ) -> PipelineResult<ParticipantValidation> {
        Ok(self.engine.validation().validate_with(key, Some(rules)).await?)
    }

    pub async fn validate_batch(
        &self,
        keys: &[ParticipantKey],
    ) -> PipelineResult<BTreeMap<ParticipantKey, ParticipantValidation>> {
        Ok(self.engine.validation().validate_batch(keys).await?)
    }

    // ---- Transformation ----

    pub async fn transform(&self, key: ParticipantKey) -> PipelineResult<TransformationOutcome> {
        Ok(self.engine.transformation().transform(key).await?)
    }

    pub async fn transform_batch(
        &self,
        keys: &[ParticipantKey],
    ) -> PipelineResult<BatchTransformation> {
        Ok(self.engine.transformation().transform_batch(keys).await?)
    }

    // ---- Distribution ----

    pub fn create_distribution(
        &self,
        records: Vec<NewDistributionRecord>,
    ) -> PipelineResult<Vec<DistributionId>> {
        if records.is_empty() {
            return Err(PipelineError::InvalidInput(
                "at least one distribution record is required".into(),
            ));
        }
        Ok(self.engine.ledger().create(records)?)
    }

    /// Hand every pending record, oldest first, to a new request.
    pub fn extract(&self, limit: Option<usize>) -> PipelineResult<Extraction> {
        let extraction = self.engine.ledger().extract_new(limit)?;
        info!(request_id = %extraction.request_id, records = extraction.len(), "distribution extracted");
        Ok(extraction)
    }

    pub fn replay(&self, request_id: RequestId) -> PipelineResult<Vec<DistributionRecord>> {
        Ok(self.engine.ledger().replay(request_id)?)
    }

    /// Confirm that `extraction` still replays identically.
    pub fn verify_replay(&self, extraction: &Extraction) -> PipelineResult<()> {
        Ok(ReplayVerifier::verify(self.engine.ledger().as_ref(), extraction)?)
    }

    pub fn pending_distribution(&self) -> PipelineResult<usize> {
        Ok(self.engine.ledger().pending_count()?)
    }

    pub fn ledger_integrity(&self) -> PipelineResult<IntegrityReport> {
        Ok(LedgerValidator::validate(self.engine.ledger().as_ref())?)
    }

    // ---- Exceptions ----

    pub fn create_exceptions(&self, batch: Vec<NewException>) -> PipelineResult<Vec<ExceptionId>> {
        if batch.is_empty() {
            return Err(PipelineError::InvalidInput(
                "at least one exception is required".into(),
            ));
        }
        Ok(self.engine.exceptions().create(batch)?)
    }

    pub fn resolve_exceptions(&self, key: ParticipantKey) -> PipelineResult<Resolution> {
        let resolution = self.engine.exceptions().resolve(key)?;
        info!(key = %key, resolved = resolution.resolved, "exceptions resolved");
        Ok(resolution)
    }

    pub fn exceptions(&self, key: ParticipantKey) -> PipelineResult<Vec<ExceptionEntry>> {
        Ok(self.engine.exceptions().list(key)?)
    }

    // ---- Reference data ----

    pub async fn upsert_gp_practices(&self, practices: Vec<GpPractice>) -> PipelineResult<usize> {
        Ok(self.engine.store().upsert_gp_practices(practices).await?)
    }
}
