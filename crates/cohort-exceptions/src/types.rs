//! Exception records and resolution results.

use chrono::{DateTime, Utc};
use cohort_types::{ExceptionId, ParticipantKey};
use serde::{Deserialize, Serialize};

/// An exception to be recorded. Everything except the key is optional
/// metadata copied through to the stored entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewException {
    pub key: ParticipantKey,
    pub category: Option<i64>,
    pub rule_id: Option<i64>,
    pub rule_name: Option<String>,
    pub rule_description: Option<String>,
    pub is_fatal: bool,
    pub file_name: Option<String>,
    /// Serialized copy of the offending record, when available.
    pub error_record: Option<String>,
    pub cohort_name: Option<String>,
    pub screening_name: Option<String>,
    /// When the failure happened. Defaults to the creation time.
    pub exception_date: Option<DateTime<Utc>>,
}

impl NewException {
    pub fn new(key: ParticipantKey) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }

    /// An exception raised by a named rule while processing `file_name`.
    pub fn for_rule(
        key: ParticipantKey,
        rule_name: impl Into<String>,
        description: impl Into<String>,
        file_name: impl Into<String>,
        is_fatal: bool,
    ) -> Self {
        Self {
            key,
            rule_name: Some(rule_name.into()),
            rule_description: Some(description.into()),
            file_name: Some(file_name.into()),
            is_fatal,
            ..Self::default()
        }
    }
}

/// A persisted exception. Only `date_resolved` and `record_updated_date`
/// ever change, and only through a resolve.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionEntry {
    pub id: ExceptionId,
    pub key: ParticipantKey,
    pub category: Option<i64>,
    pub rule_id: Option<i64>,
    pub rule_name: Option<String>,
    pub rule_description: Option<String>,
    pub is_fatal: bool,
    pub file_name: Option<String>,
    pub error_record: Option<String>,
    pub cohort_name: Option<String>,
    pub screening_name: Option<String>,
    pub exception_date: DateTime<Utc>,
    pub date_created: DateTime<Utc>,
    pub date_resolved: Option<DateTime<Utc>>,
    pub record_updated_date: Option<DateTime<Utc>>,
}

impl ExceptionEntry {
    pub fn from_new(id: ExceptionId, new: NewException, at: DateTime<Utc>) -> Self {
        Self {
            id,
            key: new.key,
            category: new.category,
            rule_id: new.rule_id,
            rule_name: new.rule_name,
            rule_description: new.rule_description,
            is_fatal: new.is_fatal,
            file_name: new.file_name,
            error_record: new.error_record,
            cohort_name: new.cohort_name,
            screening_name: new.screening_name,
            exception_date: new.exception_date.unwrap_or(at),
            date_created: at,
            date_resolved: None,
            record_updated_date: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.date_resolved.is_some()
    }

    pub(crate) fn resolve(&mut self, at: DateTime<Utc>) {
        self.date_resolved = Some(at);
        self.record_updated_date = Some(at);
    }
}

/// Outcome of resolving every open exception for one key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub key: ParticipantKey,
    pub resolved: usize,
    /// Shared by every entry resolved in this call.
    pub resolved_at: DateTime<Utc>,
}
