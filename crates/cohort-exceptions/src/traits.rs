//! The [`ExceptionSink`] trait.

use cohort_types::{ExceptionId, ParticipantKey};

use crate::error::Result;
use crate::types::{ExceptionEntry, NewException, Resolution};

/// Storage for rule-failure exceptions.
///
/// Entries are append-only apart from resolution, which stamps every open
/// entry for a key with one shared timestamp.
pub trait ExceptionSink: Send + Sync {
    /// Record a batch of exceptions, returning their ids in input order.
    fn create(&self, batch: Vec<NewException>) -> Result<Vec<ExceptionId>>;

    /// Resolve every unresolved exception for `key`.
    ///
    /// Fails with `NotFound` when the key has nothing open.
    fn resolve(&self, key: ParticipantKey) -> Result<Resolution>;

    /// All exceptions for `key`, oldest first.
    fn list(&self, key: ParticipantKey) -> Result<Vec<ExceptionEntry>>;

    /// Unresolved exceptions for `key`, oldest first.
    fn unresolved(&self, key: ParticipantKey) -> Result<Vec<ExceptionEntry>> {
        Ok(self
            .list(key)?
            .into_iter()
            .filter(|entry| !entry.is_resolved())
            .collect())
    }
}
