use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use cohort_types::{DistributionId, RequestId};
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::records::{DistributionRecord, Extraction, NewDistributionRecord};
use crate::traits::{DistributionReader, DistributionWriter};

/// In-memory distribution ledger for tests, local runs, and embedding.
///
/// Extraction holds the write guard from the first read of unextracted rows
/// until the last row is marked, so two concurrent extractions never see
/// the same record.
pub struct InMemoryDistributionLedger {
    inner: RwLock<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    last_id: u64,
    records: BTreeMap<DistributionId, DistributionRecord>,
    /// Non-empty extractions in the order they ran.
    extractions: Vec<RequestId>,
}

impl InMemoryDistributionLedger {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LedgerState::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>, LedgerError> {
        self.inner.read().map_err(|_| LedgerError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, LedgerError> {
        self.inner.write().map_err(|_| LedgerError::Poisoned)
    }
}

impl Default for InMemoryDistributionLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributionWriter for InMemoryDistributionLedger {
    fn create(
        &self,
        records: Vec<NewDistributionRecord>,
    ) -> Result<Vec<DistributionId>, LedgerError> {
        let now = Utc::now();
        let mut state = self.write()?;
        let mut ids = Vec::with_capacity(records.len());
        for fields in records {
            state.last_id += 1;
            let id = DistributionId::new(state.last_id);
            state
                .records
                .insert(id, DistributionRecord::staged(id, fields, now));
            ids.push(id);
        }
        debug!(count = ids.len(), "distribution records staged");
        Ok(ids)
    }

    fn extract_new(&self, limit: Option<usize>) -> Result<Extraction, LedgerError> {
        if limit == Some(0) {
            return Err(LedgerError::InvalidInput("limit must be positive".into()));
        }
        let request_id = RequestId::new();
        let now = Utc::now();

        let mut state = self.write()?;
        let mut records = Vec::new();
        for record in state
            .records
            .values_mut()
            .filter(|r| !r.is_extracted)
            .take(limit.unwrap_or(usize::MAX))
        {
            record.mark_extracted(request_id, now);
            records.push(record.clone());
        }
        if !records.is_empty() {
            state.extractions.push(request_id);
        }
        drop(state);

        info!(
            request_id = %request_id,
            records = records.len(),
            "distribution records extracted"
        );
        Ok(Extraction {
            request_id,
            records,
        })
    }
}

impl DistributionReader for InMemoryDistributionLedger {
    fn replay(&self, request_id: RequestId) -> Result<Vec<DistributionRecord>, LedgerError> {
        let state = self.read()?;
        let records: Vec<_> = state
            .records
            .values()
            .filter(|r| r.request_id == Some(request_id))
            .cloned()
            .collect();
        if records.is_empty() {
            return Err(LedgerError::RequestNotFound(request_id));
        }
        Ok(records)
    }

    fn get(&self, id: DistributionId) -> Result<Option<DistributionRecord>, LedgerError> {
        Ok(self.read()?.records.get(&id).cloned())
    }

    fn pending_count(&self) -> Result<usize, LedgerError> {
        Ok(self
            .read()?
            .records
            .values()
            .filter(|r| !r.is_extracted)
            .count())
    }

    fn request_ids(&self) -> Result<Vec<RequestId>, LedgerError> {
        Ok(self.read()?.extractions.clone())
    }

    fn records(&self) -> Result<Vec<DistributionRecord>, LedgerError> {
        Ok(self.read()?.records.values().cloned().collect())
    }
}
