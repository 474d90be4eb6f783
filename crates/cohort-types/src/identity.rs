use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Natural unique identifier for a person record (the NHS number).
///
/// Keys are unique within each projection. The zero key is treated as
/// "blank": ingestion sources that omit the number default to it, and the
/// identity validation rules reject it.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantKey(u64);

impl ParticipantKey {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The blank key (zero).
    pub const fn blank() -> Self {
        Self(0)
    }

    pub fn is_blank(&self) -> bool {
        self.0 == 0
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ParticipantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantKey({})", self.0)
    }
}

impl fmt::Display for ParticipantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ParticipantKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|_| TypeError::InvalidKey(s.to_string()))
    }
}

impl From<u64> for ParticipantKey {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

macro_rules! sequential_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub fn value(&self) -> u64 {
                self.0
            }

            /// The id following this one.
            pub fn next(&self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

sequential_id!(
    /// Identifier assigned to each ingested file.
    FileId,
    "FileId"
);
sequential_id!(
    /// Identifier of a raw cohort record.
    RecordId,
    "RecordId"
);
sequential_id!(
    /// Insertion-ordered identifier of a staged distribution record.
    DistributionId,
    "DistributionId"
);
sequential_id!(
    /// Identifier of a persisted exception entry.
    ExceptionId,
    "ExceptionId"
);
sequential_id!(
    /// Identifier assigned to a participant management row on first insert.
    ParticipantId,
    "ParticipantId"
);

/// Identifier shared by every record handed off in one extraction
/// (UUID v7 for time-ordering).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(uuid::Uuid);

impl RequestId {
    /// Generate a fresh, time-ordered request id.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Short representation (first 8 characters of the UUID).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.short_id())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| TypeError::InvalidRequestId(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn key_parses_with_spacing() {
        let key: ParticipantKey = "943 476 5919".parse().unwrap();
        assert_eq!(key.value(), 9434765919);
        assert_eq!(key.to_string(), "9434765919");
    }

    #[test]
    fn key_rejects_garbage() {
        assert!("not-a-number".parse::<ParticipantKey>().is_err());
        assert!("".parse::<ParticipantKey>().is_err());
    }

    #[test]
    fn blank_key() {
        assert!(ParticipantKey::blank().is_blank());
        assert!(!ParticipantKey::new(1).is_blank());
    }

    #[test]
    fn key_serializes_as_number() {
        let json = serde_json::to_string(&ParticipantKey::new(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn sequential_ids_advance() {
        let id = FileId::new(1);
        assert_eq!(id.next(), FileId::new(2));
        assert!(FileId::new(1) < FileId::new(2));
    }

    #[test]
    fn request_ids_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
        assert_eq!(a.short_id().len(), 8);
    }

    #[test]
    fn request_id_roundtrips_through_string() {
        let id = RequestId::new();
        let parsed: RequestId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("nope".parse::<RequestId>().is_err());
    }

    proptest! {
        #[test]
        fn grouped_keys_parse_to_the_same_value(value in 1u64..9_999_999_999, split in 1usize..9) {
            let digits = value.to_string();
            let split = split.min(digits.len());
            let spaced = format!(" {} {} ", &digits[..split], &digits[split..]);
            let key: ParticipantKey = spaced.parse().unwrap();
            prop_assert_eq!(key, ParticipantKey::new(value));
            prop_assert_eq!(key.to_string(), digits);
        }
    }
}
