//! In-memory exception sink for tests and ephemeral use.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::Utc;
use cohort_types::{ExceptionId, ParticipantKey};
use tracing::{debug, info};

use crate::error::{ExceptionError, Result};
use crate::traits::ExceptionSink;
use crate::types::{ExceptionEntry, NewException, Resolution};

#[derive(Debug, Default)]
struct Entries {
    last_id: u64,
    by_id: BTreeMap<ExceptionId, ExceptionEntry>,
}

/// An in-memory implementation of [`ExceptionSink`].
///
/// Entries live in a `BTreeMap` keyed by id behind a `RwLock`, so listing
/// is naturally oldest first.
#[derive(Debug, Default)]
pub struct InMemoryExceptionSink {
    entries: RwLock<Entries>,
}

impl InMemoryExceptionSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored exceptions across all keys.
    pub fn len(&self) -> Result<usize> {
        let entries = self.entries.read().map_err(|_| ExceptionError::Poisoned)?;
        Ok(entries.by_id.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl ExceptionSink for InMemoryExceptionSink {
    fn create(&self, batch: Vec<NewException>) -> Result<Vec<ExceptionId>> {
        if batch.iter().any(|e| e.key.is_blank()) {
            return Err(ExceptionError::InvalidInput(
                "exception without a participant key".into(),
            ));
        }
        let now = Utc::now();
        let mut entries = self.entries.write().map_err(|_| ExceptionError::Poisoned)?;
        let ids = batch
            .into_iter()
            .map(|new| {
                entries.last_id += 1;
                let id = ExceptionId::new(entries.last_id);
                entries.by_id.insert(id, ExceptionEntry::from_new(id, new, now));
                id
            })
            .collect::<Vec<_>>();
        debug!(count = ids.len(), "exceptions created");
        Ok(ids)
    }

    fn resolve(&self, key: ParticipantKey) -> Result<Resolution> {
        let resolved_at = Utc::now();
        let mut entries = self.entries.write().map_err(|_| ExceptionError::Poisoned)?;
        let mut resolved = 0;
        for entry in entries
            .by_id
            .values_mut()
            .filter(|e| e.key == key && !e.is_resolved())
        {
            entry.resolve(resolved_at);
            resolved += 1;
        }
        if resolved == 0 {
            return Err(ExceptionError::NotFound(key));
        }
        info!(%key, resolved, "exceptions resolved");
        Ok(Resolution {
            key,
            resolved,
            resolved_at,
        })
    }

    fn list(&self, key: ParticipantKey) -> Result<Vec<ExceptionEntry>> {
        let entries = self.entries.read().map_err(|_| ExceptionError::Poisoned)?;
        Ok(entries
            .by_id
            .values()
            .filter(|e| e.key == key)
            .cloned()
            .collect())
    }
}
