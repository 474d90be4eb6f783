use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::field::FieldValue;
use crate::identity::{FileId, ParticipantKey, RecordId};

/// A raw ingested row: column name to value, as produced by the ingestion
/// gateway.
pub type RawRecord = BTreeMap<String, FieldValue>;

/// Column carrying the participant key in raw records.
pub const KEY_COLUMN: &str = "nhs_number";

/// Immutable raw record tagged with the file it arrived in. Append-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortRecord {
    pub id: RecordId,
    pub file_id: FileId,
    /// `None` when the row carries no usable key.
    pub key: Option<ParticipantKey>,
    pub fields: RawRecord,
    pub created_at: DateTime<Utc>,
}

impl CohortRecord {
    pub fn field(&self, column: &str) -> &FieldValue {
        self.fields.get(column).unwrap_or(&FieldValue::Null)
    }
}

/// Extract the participant key from a raw row.
///
/// Accepts integer or digit-string values; anything else, and the blank
/// key, yield `None`.
pub fn key_of(fields: &RawRecord) -> Option<ParticipantKey> {
    let key = match fields.get(KEY_COLUMN)? {
        FieldValue::Int(i) if *i > 0 => ParticipantKey::new(*i as u64),
        FieldValue::Text(s) => s.parse().ok()?,
        _ => return None,
    };
    (!key.is_blank()).then_some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(value: FieldValue) -> RawRecord {
        let mut r = RawRecord::new();
        r.insert(KEY_COLUMN.into(), value);
        r
    }

    #[test]
    fn key_from_int_or_text() {
        assert_eq!(key_of(&raw(FieldValue::Int(12))), Some(ParticipantKey::new(12)));
        assert_eq!(
            key_of(&raw(FieldValue::text("943 476 5919"))),
            Some(ParticipantKey::new(9434765919))
        );
    }

    #[test]
    fn missing_or_blank_key() {
        assert_eq!(key_of(&RawRecord::new()), None);
        assert_eq!(key_of(&raw(FieldValue::Null)), None);
        assert_eq!(key_of(&raw(FieldValue::Int(0))), None);
        assert_eq!(key_of(&raw(FieldValue::text("0"))), None);
        assert_eq!(key_of(&raw(FieldValue::Int(-4))), None);
    }

    #[test]
    fn absent_column_reads_as_null() {
        let record = CohortRecord {
            id: RecordId::new(1),
            file_id: FileId::new(1),
            key: None,
            fields: RawRecord::new(),
            created_at: Utc::now(),
        };
        assert!(record.field("postcode").is_null());
    }
}
