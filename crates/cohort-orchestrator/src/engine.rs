//! Staged processing of one ingested file.
//!
//! Stages run in order: cohort loading, demographics loading, management
//! loading, validation, transformation, distribution loading. A failure in
//! a whole-file stage aborts the file with `has_errors` set. Validation and
//! transformation are record-granular: a failing record is captured on its
//! status and as exceptions, and the rest of the file carries on.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use cohort_exceptions::{ExceptionSink, NewException};
use cohort_ledger::{DistributionLedger, NewDistributionRecord};
use cohort_store::PipelineStore;
use cohort_transform::TransformationEngine;
use cohort_types::{
    CohortRecord, FileId, FileStatus, ParticipantKey, ParticipantSnapshot, RecordStatus, Stage,
};
use cohort_validation::ValidationEngine;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::{DistributionSource, PipelineConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::ingest::{FileType, IngestedFile, IngestionGateway};
use crate::loader;
use crate::report::{ProcessFileReport, RecordFailure, RecordOutcome};

/// A participant carried through the record stages.
struct Tracked<'a> {
    record: &'a CohortRecord,
    status: RecordStatus,
    /// Snapshot staged for distribution once transformation succeeds.
    staged: Option<ParticipantSnapshot>,
}

#[derive(Debug, Default)]
struct StageTally {
    passed: u64,
    failed: u64,
    exceptions: u64,
}

/// Drives files through every stage against one store.
pub struct OrchestrationEngine<S: ?Sized> {
    store: Arc<S>,
    gateway: Arc<dyn IngestionGateway>,
    validation: ValidationEngine<S>,
    transformation: TransformationEngine<S>,
    exceptions: Arc<dyn ExceptionSink>,
    ledger: Arc<dyn DistributionLedger>,
    config: PipelineConfig,
}

impl<S: PipelineStore + ?Sized> OrchestrationEngine<S> {
    /// Build an engine with the default validation rules and the
    /// transformation rules named by `config`.
    pub fn new(
        store: Arc<S>,
        gateway: Arc<dyn IngestionGateway>,
        exceptions: Arc<dyn ExceptionSink>,
        ledger: Arc<dyn DistributionLedger>,
        config: PipelineConfig,
    ) -> PipelineResult<Self> {
        config.check()?;
        let validation =
            ValidationEngine::with_default_rules(Arc::clone(&store), config.validation.clone());
        let transformation =
            TransformationEngine::from_config(Arc::clone(&store), &config.transformation)?;
        Ok(Self {
            store,
            gateway,
            validation,
            transformation,
            exceptions,
            ledger,
            config,
        })
    }

    /// Replace the validation engine, e.g. with a custom rule set.
    pub fn with_validation(mut self, validation: ValidationEngine<S>) -> Self {
        self.validation = validation;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn validation(&self) -> &ValidationEngine<S> {
        &self.validation
    }

    pub fn transformation(&self) -> &TransformationEngine<S> {
        &self.transformation
    }

    pub fn exceptions(&self) -> &Arc<dyn ExceptionSink> {
        &self.exceptions
    }

    pub fn ledger(&self) -> &Arc<dyn DistributionLedger> {
        &self.ledger
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Ingest `path` and run it through every stage.
    ///
    /// Ingestion errors (`NotFound`, `UnsupportedType`, `Conflict`) are
    /// returned before any state is written. Once a file id is allocated,
    /// a failing whole-file stage returns `FatalStage` and leaves the file
    /// status with `has_errors` set and the failed stage incomplete.
    pub async fn process_file(
        &self,
        path: &str,
        file_type: FileType,
    ) -> PipelineResult<ProcessFileReport> {
        let IngestedFile {
            filename,
            content_hash,
            records,
        } = self.gateway.ingest(path, file_type).await?;

        let file_id = self.store.next_file_id().await?;
        let mut status = FileStatus::new(file_id, filename.as_str(), Utc::now());
        status.total_records = records.len() as u64;
        self.store.insert_file_status(status.clone()).await?;
        info!(%file_id, %filename, records = status.total_records, "file processing started");

        let cohort = self
            .guard(&mut status, Stage::CohortLoading, async {
                let cohort = self.store.append_cohort(file_id, records).await?;
                Ok::<_, PipelineError>(cohort)
            })
            .await?;
        self.complete(&mut status, Stage::CohortLoading).await?;

        let skipped = self
            .guard(&mut status, Stage::DemographicsLoading, async {
                let projected = loader::project(&cohort, loader::demographic_from)?;
                let summary = self.store.upsert_demographics(projected.rows).await?;
                debug!(%file_id, inserted = summary.inserted, updated = summary.updated, "demographics upserted");
                Ok::<_, PipelineError>(projected.skipped)
            })
            .await?;
        if skipped > 0 {
            warn!(%file_id, skipped, "records without an NHS number were skipped");
        }
        self.complete(&mut status, Stage::DemographicsLoading).await?;

        self.guard(&mut status, Stage::ParticipantManagementLoading, async {
            let projected = loader::project(&cohort, loader::management_from)?;
            let summary = self.store.upsert_managements(projected.rows).await?;
            debug!(%file_id, inserted = summary.inserted, updated = summary.updated, "management rows upserted");
            Ok::<_, PipelineError>(())
        })
        .await?;
        self.complete(&mut status, Stage::ParticipantManagementLoading)
            .await?;

        let mut tracked = track(&status, &cohort);
        let mut exceptions_created = 0;

        let file = status.clone();
        let validated = self
            .guard(
                &mut status,
                Stage::Validation,
                self.validate_records(&file, &mut tracked),
            )
            .await?;
        status.records_passed = validated.passed;
        status.records_failed = validated.failed;
        if validated.failed > 0 {
            status.mark_errors(Utc::now());
        }
        exceptions_created += validated.exceptions;
        self.complete(&mut status, Stage::Validation).await?;

        let transformed = self
            .guard(
                &mut status,
                Stage::Transformation,
                self.transform_records(&file, &mut tracked),
            )
            .await?;
        exceptions_created += transformed.exceptions;
        self.complete(&mut status, Stage::Transformation).await?;

        let distributed = self
            .guard(
                &mut status,
                Stage::DistributionLoading,
                self.distribute(&mut tracked),
            )
            .await?;
        status.records_distributed = distributed;
        self.complete(&mut status, Stage::DistributionLoading)
            .await?;

        status.finish(Utc::now());
        self.store.update_file_status(status.clone()).await?;
        info!(
            %file_id,
            passed = status.records_passed,
            failed = status.records_failed,
            distributed = status.records_distributed,
            "file processing complete"
        );

        Ok(ProcessFileReport {
            file_id,
            filename,
            content_hash: content_hash.to_hex(),
            total_records: status.total_records,
            records_processed: tracked.len() as u64,
            records_skipped: skipped as u64,
            records_passed: status.records_passed,
            records_failed: status.records_failed,
            records_distributed: status.records_distributed,
            exceptions_created,
            stages_completed: status.stages_completed(),
            current_stage: status.current_stage,
            is_complete: status.is_complete,
            has_errors: status.has_errors,
        })
    }

    pub async fn file_status(&self, file_id: FileId) -> PipelineResult<FileStatus> {
        self.store
            .file_status(file_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("File {file_id} not found")))
    }

    pub async fn record_status(
        &self,
        file_id: FileId,
        key: ParticipantKey,
    ) -> PipelineResult<RecordStatus> {
        self.store.record_status(file_id, key).await?.ok_or_else(|| {
            PipelineError::NotFound(format!(
                "No record status for NHS number {key} in file {file_id}"
            ))
        })
    }

    // -----------------------------------------------------------------------
    // Record stages
    // -----------------------------------------------------------------------

    /// Persist each record's status as it enters validation, then validate.
    async fn validate_records(
        &self,
        file: &FileStatus,
        tracked: &mut [Tracked<'_>],
    ) -> PipelineResult<StageTally> {
        let results = self
            .bounded(tracked.iter().map(|t| {
                let entering = t.status.clone();
                async move {
                    let key = entering.key;
                    self.store.upsert_record_status(entering).await?;
                    Ok::<_, PipelineError>(self.validation.validate(key).await)
                }
            }))
            .await;

        let now = Utc::now();
        let mut tally = StageTally::default();
        let mut raised = Vec::new();
        for (t, result) in tracked.iter_mut().zip(results) {
            let outcome = match result? {
                Ok(validation) => {
                    t.status.warning_count =
                        validation.results.iter().filter(|r| r.is_warning()).count() as u32;
                    RecordOutcome::of_validation(&validation)
                }
                Err(err) => RecordOutcome::failed("validation", err.to_string()),
            };
            if outcome.passed() {
                t.status.validation_passed = true;
                t.status.advance_to(Stage::Transformation, now)?;
                tally.passed += 1;
            } else {
                t.status.has_validation_errors = true;
                t.status.updated_at = now;
                tally.failed += 1;
                warn!(file_id = %file.file_id, key = %t.status.key, failures = outcome.failures().len(), "record failed validation");
                self.raise(file, t, outcome.failures(), &mut raised);
            }
            self.store.upsert_record_status(t.status.clone()).await?;
        }
        tally.exceptions = self.persist_exceptions(raised)?;
        Ok(tally)
    }

    /// Transform every record that passed validation and stage its snapshot.
    async fn transform_records(
        &self,
        file: &FileStatus,
        tracked: &mut [Tracked<'_>],
    ) -> PipelineResult<StageTally> {
        let results = self
            .bounded(tracked.iter().map(|t| {
                let key = t.status.key;
                let eligible = t.status.validation_passed;
                async move {
                    if eligible {
                        Some(self.transformation.transform(key).await)
                    } else {
                        None
                    }
                }
            }))
            .await;

        let now = Utc::now();
        let source = self.config.stage_distribution_from;
        let mut tally = StageTally::default();
        let mut raised = Vec::new();
        for (t, result) in tracked.iter_mut().zip(results) {
            let Some(result) = result else { continue };
            let outcome = match result {
                Ok(transformed) => {
                    let outcome = RecordOutcome::of_transformation(&transformed);
                    if outcome.passed() {
                        t.staged = Some(match source {
                            DistributionSource::Outbound => transformed.outbound,
                            DistributionSource::Inbound => transformed.inbound,
                        });
                    }
                    outcome
                }
                Err(err) => RecordOutcome::failed("transformation", err.to_string()),
            };
            if outcome.passed() {
                t.status.transformation_applied = true;
                t.status.advance_to(Stage::DistributionLoading, now)?;
                tally.passed += 1;
            } else {
                t.status.has_transformation_errors = true;
                t.status.updated_at = now;
                tally.failed += 1;
                warn!(file_id = %file.file_id, key = %t.status.key, "record failed transformation");
                self.raise(file, t, outcome.failures(), &mut raised);
            }
            self.store.upsert_record_status(t.status.clone()).await?;
        }
        tally.exceptions = self.persist_exceptions(raised)?;
        Ok(tally)
    }

    /// Stage every transformed record into the ledger in one batch.
    async fn distribute(&self, tracked: &mut [Tracked<'_>]) -> PipelineResult<u64> {
        let mut batch = Vec::new();
        let mut owners = Vec::new();
        for (index, t) in tracked.iter().enumerate() {
            if !t.status.transformation_applied {
                continue;
            }
            match t.staged.as_ref().and_then(NewDistributionRecord::from_snapshot) {
                Some(row) => {
                    batch.push(row);
                    owners.push(index);
                }
                None => debug!(key = %t.status.key, "snapshot incomplete; not distributed"),
            }
        }
        if batch.is_empty() {
            return Ok(0);
        }

        // Status rows go first and as one unit, so a failed write leaves no
        // staged output behind.
        let now = Utc::now();
        let mut statuses = Vec::with_capacity(owners.len());
        for index in owners {
            let status = &mut tracked[index].status;
            status.distributed = true;
            status.advance_to(Stage::Complete, now)?;
            statuses.push(status.clone());
        }
        self.store.upsert_record_statuses(statuses).await?;
        let ids = self.ledger.create(batch)?;
        Ok(ids.len() as u64)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Run `tasks` concurrently, at most `max_concurrent_records` at a
    /// time. Outputs keep the input order.
    async fn bounded<F: Future>(&self, tasks: impl IntoIterator<Item = F>) -> Vec<F::Output> {
        let permits = Semaphore::new(self.config.max_concurrent_records);
        let permits = &permits;
        join_all(tasks.into_iter().map(move |task| async move {
            let _permit = permits.acquire().await.ok();
            task.await
        }))
        .await
    }

    /// Await a stage's work, converting any error into a fatal stage
    /// failure recorded on the file status.
    async fn guard<T>(
        &self,
        status: &mut FileStatus,
        stage: Stage,
        work: impl Future<Output = PipelineResult<T>>,
    ) -> PipelineResult<T> {
        debug!(file_id = %status.file_id, %stage, "stage started");
        match work.await {
            Ok(value) => Ok(value),
            Err(err) => Err(self.abort(status, stage, err).await),
        }
    }

    async fn complete(&self, status: &mut FileStatus, stage: Stage) -> PipelineResult<()> {
        if let Err(err) = status.complete_stage(stage, Utc::now()) {
            return Err(self.abort(status, stage, err.into()).await);
        }
        if let Err(err) = self.store.update_file_status(status.clone()).await {
            return Err(self.abort(status, stage, err.into()).await);
        }
        info!(file_id = %status.file_id, %stage, "stage complete");
        Ok(())
    }

    async fn abort(&self, status: &mut FileStatus, stage: Stage, err: PipelineError) -> PipelineError {
        let reason = err.to_string();
        error!(file_id = %status.file_id, %stage, error = %reason, "stage failed; file aborted");
        status.mark_errors(Utc::now());
        if let Err(persist) = self.store.update_file_status(status.clone()).await {
            error!(file_id = %status.file_id, error = %persist, "could not record stage failure");
        }
        PipelineError::FatalStage {
            stage,
            file_id: status.file_id,
            reason,
        }
    }

    /// Queue one exception per `Error` failure and count them on the record.
    fn raise(
        &self,
        file: &FileStatus,
        t: &mut Tracked<'_>,
        failures: &[RecordFailure],
        raised: &mut Vec<NewException>,
    ) {
        let error_record = serde_json::to_string(&t.record.fields).ok();
        let before = raised.len();
        for failure in failures.iter().filter(|f| f.raises_exception()) {
            let mut exception = NewException::for_rule(
                t.status.key,
                failure.rule_name.as_str(),
                failure.message.as_str(),
                file.filename.as_str(),
                true,
            );
            exception.rule_id = self
                .validation
                .rule_info(&failure.rule_name)
                .map(|(index, _)| index as i64 + 1);
            exception.error_record = error_record.clone();
            exception.cohort_name = self.config.cohort_name.clone();
            exception.screening_name = self.config.screening_name.clone();
            raised.push(exception);
        }
        t.status.exception_count += (raised.len() - before) as u32;
    }

    fn persist_exceptions(&self, raised: Vec<NewException>) -> PipelineResult<u64> {
        if raised.is_empty() {
            return Ok(0);
        }
        Ok(self.exceptions.create(raised)?.len() as u64)
    }
}

/// One tracked entry per distinct keyed record, in first-seen order.
fn track<'a>(file: &FileStatus, cohort: &'a [CohortRecord]) -> Vec<Tracked<'a>> {
    let now = Utc::now();
    let mut seen = HashSet::new();
    cohort
        .iter()
        .filter_map(|record| {
            let key = record.key.filter(|key| seen.insert(*key))?;
            Some(Tracked {
                record,
                status: RecordStatus::entering_validation(file, key, record.id, now),
                staged: None,
            })
        })
        .collect()
}
