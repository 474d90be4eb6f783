use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use cohort_types::{
    key_of, CohortRecord, DemographicSnapshot, FileId, FileStatus, GpPractice, ManagementSnapshot,
    ParticipantId, ParticipantKey, ParticipantSnapshot, RawRecord, RecordId, RecordStatus,
    ReferenceData,
};

use crate::error::{StoreError, StoreResult};
use crate::traits::{CohortStore, ProjectionStore, ReferenceStore, StatusStore, UpsertSummary};

#[derive(Default)]
struct Tables {
    last_file_id: u64,
    last_record_id: u64,
    last_participant_id: u64,
    cohort: BTreeMap<FileId, Vec<CohortRecord>>,
    demographics: HashMap<ParticipantKey, DemographicSnapshot>,
    managements: HashMap<ParticipantKey, ManagementSnapshot>,
    file_statuses: BTreeMap<FileId, FileStatus>,
    record_statuses: BTreeMap<(FileId, ParticipantKey), RecordStatus>,
    reference: ReferenceData,
}

/// In-memory implementation of every store trait.
///
/// Intended for tests, the CLI and embedding. All tables sit behind one
/// `RwLock`, so each trait call is atomic with respect to the others. The
/// guard is never held across an `.await`.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// A store pre-loaded with reference data.
    pub fn with_reference(reference: ReferenceData) -> Self {
        Self {
            tables: RwLock::new(Tables {
                reference,
                ..Tables::default()
            }),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }

    pub fn demographic_count(&self) -> usize {
        self.read().map(|t| t.demographics.len()).unwrap_or(0)
    }

    pub fn management_count(&self) -> usize {
        self.read().map(|t| t.managements.len()).unwrap_or(0)
    }

    pub fn file_count(&self) -> usize {
        self.read().map(|t| t.file_statuses.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("files", &self.file_count())
            .field("demographics", &self.demographic_count())
            .field("managements", &self.management_count())
            .finish()
    }
}

fn reject_blank_keys<'a>(keys: impl Iterator<Item = &'a ParticipantKey>) -> StoreResult<()> {
    for key in keys {
        if key.is_blank() {
            return Err(StoreError::InvalidInput(
                "projection row has a blank participant key".into(),
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl CohortStore for InMemoryStore {
    async fn next_file_id(&self) -> StoreResult<FileId> {
        let mut tables = self.write()?;
        tables.last_file_id += 1;
        Ok(FileId::new(tables.last_file_id))
    }

    async fn append_cohort(
        &self,
        file_id: FileId,
        records: Vec<RawRecord>,
    ) -> StoreResult<Vec<CohortRecord>> {
        let now = Utc::now();
        let mut tables = self.write()?;
        if tables.cohort.contains_key(&file_id) {
            return Err(StoreError::Duplicate(format!("cohort records for file {file_id}")));
        }
        let mut next = tables.last_record_id;
        let appended: Vec<CohortRecord> = records
            .into_iter()
            .map(|fields| {
                next += 1;
                CohortRecord {
                    id: RecordId::new(next),
                    file_id,
                    key: key_of(&fields),
                    fields,
                    created_at: now,
                }
            })
            .collect();
        tables.last_record_id = next;
        tables.cohort.insert(file_id, appended.clone());
        tracing::debug!(file_id = %file_id, count = appended.len(), "appended cohort records");
        Ok(appended)
    }

    async fn cohort_records(&self, file_id: FileId) -> StoreResult<Vec<CohortRecord>> {
        let tables = self.read()?;
        Ok(tables.cohort.get(&file_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ProjectionStore for InMemoryStore {
    async fn demographic(&self, key: ParticipantKey) -> StoreResult<Option<DemographicSnapshot>> {
        Ok(self.read()?.demographics.get(&key).cloned())
    }

    async fn management(&self, key: ParticipantKey) -> StoreResult<Option<ManagementSnapshot>> {
        Ok(self.read()?.managements.get(&key).cloned())
    }

    async fn snapshot(&self, key: ParticipantKey) -> StoreResult<ParticipantSnapshot> {
        let tables = self.read()?;
        Ok(ParticipantSnapshot::new(
            key,
            tables.demographics.get(&key).cloned(),
            tables.managements.get(&key).cloned(),
        ))
    }

    async fn upsert_demographics(
        &self,
        batch: Vec<DemographicSnapshot>,
    ) -> StoreResult<UpsertSummary> {
        reject_blank_keys(batch.iter().map(|d| &d.nhs_number))?;
        let now = Utc::now();
        let mut tables = self.write()?;
        let mut summary = UpsertSummary::default();
        for mut row in batch {
            let existing = tables
                .demographics
                .get(&row.nhs_number)
                .map(|d| d.record_insert_datetime);
            match existing {
                Some(inserted_at) => {
                    row.record_insert_datetime = inserted_at;
                    summary.updated += 1;
                }
                None => {
                    row.record_insert_datetime.get_or_insert(now);
                    summary.inserted += 1;
                }
            }
            row.record_update_datetime = Some(now);
            tables.demographics.insert(row.nhs_number, row);
        }
        Ok(summary)
    }

    async fn upsert_managements(
        &self,
        batch: Vec<ManagementSnapshot>,
    ) -> StoreResult<UpsertSummary> {
        reject_blank_keys(batch.iter().map(|m| &m.nhs_number))?;
        let now = Utc::now();
        let mut tables = self.write()?;
        let mut summary = UpsertSummary::default();
        for mut row in batch {
            let existing = tables
                .managements
                .get(&row.nhs_number)
                .map(|m| (m.participant_id, m.record_insert_datetime));
            match existing {
                Some((participant_id, inserted_at)) => {
                    row.participant_id = participant_id;
                    row.record_insert_datetime = inserted_at;
                    summary.updated += 1;
                }
                None => {
                    tables.last_participant_id += 1;
                    row.participant_id = Some(ParticipantId::new(tables.last_participant_id));
                    row.record_insert_datetime.get_or_insert(now);
                    summary.inserted += 1;
                }
            }
            row.record_update_datetime = Some(now);
            tables.managements.insert(row.nhs_number, row);
        }
        Ok(summary)
    }
}

#[async_trait]
impl StatusStore for InMemoryStore {
    async fn insert_file_status(&self, status: FileStatus) -> StoreResult<()> {
        let mut tables = self.write()?;
        if tables.file_statuses.contains_key(&status.file_id) {
            return Err(StoreError::Duplicate(format!("file status {}", status.file_id)));
        }
        tables.file_statuses.insert(status.file_id, status);
        Ok(())
    }

    async fn update_file_status(&self, status: FileStatus) -> StoreResult<()> {
        let mut tables = self.write()?;
        let previous = tables
            .file_statuses
            .get(&status.file_id)
            .ok_or(StoreError::FileNotFound(status.file_id))?;
        if let Some(reason) = status.regression_from(previous) {
            return Err(StoreError::Regression {
                entity: format!("file {}", status.file_id),
                reason,
            });
        }
        tables.file_statuses.insert(status.file_id, status);
        Ok(())
    }

    async fn file_status(&self, file_id: FileId) -> StoreResult<Option<FileStatus>> {
        Ok(self.read()?.file_statuses.get(&file_id).cloned())
    }

    async fn upsert_record_status(&self, status: RecordStatus) -> StoreResult<()> {
        let mut tables = self.write()?;
        let id = (status.file_id, status.key);
        if let Some(previous) = tables.record_statuses.get(&id) {
            if let Some(reason) = status.regression_from(previous) {
                return Err(StoreError::Regression {
                    entity: format!("record {} in file {}", status.key, status.file_id),
                    reason,
                });
            }
        }
        tables.record_statuses.insert(id, status);
        Ok(())
    }

    async fn upsert_record_statuses(&self, statuses: Vec<RecordStatus>) -> StoreResult<()> {
        let mut tables = self.write()?;
        for status in &statuses {
            let id = (status.file_id, status.key);
            if let Some(reason) = tables
                .record_statuses
                .get(&id)
                .and_then(|previous| status.regression_from(previous))
            {
                return Err(StoreError::Regression {
                    entity: format!("record {} in file {}", status.key, status.file_id),
                    reason,
                });
            }
        }
        for status in statuses {
            tables.record_statuses.insert((status.file_id, status.key), status);
        }
        Ok(())
    }

    async fn record_status(
        &self,
        file_id: FileId,
        key: ParticipantKey,
    ) -> StoreResult<Option<RecordStatus>> {
        Ok(self.read()?.record_statuses.get(&(file_id, key)).cloned())
    }

    async fn record_statuses(&self, file_id: FileId) -> StoreResult<Vec<RecordStatus>> {
        let tables = self.read()?;
        Ok(tables
            .record_statuses
            .range((file_id, ParticipantKey::blank())..)
            .take_while(|((f, _), _)| *f == file_id)
            .map(|(_, status)| status.clone())
            .collect())
    }
}

#[async_trait]
impl ReferenceStore for InMemoryStore {
    async fn reference_data(&self) -> StoreResult<ReferenceData> {
        Ok(self.read()?.reference.clone())
    }

    async fn upsert_gp_practices(&self, practices: Vec<GpPractice>) -> StoreResult<usize> {
        let count = practices.len();
        self.write()?.reference.extend(practices);
        Ok(count)
    }
}
