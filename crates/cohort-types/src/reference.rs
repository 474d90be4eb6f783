use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A registered GP practice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpPractice {
    pub code: String,
    pub name: Option<String>,
}

impl GpPractice {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: None,
        }
    }

    pub fn named(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: Some(name.into()),
        }
    }
}

/// Practice codes loaded by [`ReferenceData::seeded`].
pub const SEED_PRACTICE_CODES: &[&str] = &[
    "GP001", "GP002", "A12345", "B23456", "C34567", "X12345", "Y23456", "Z34567", "X99999",
    "Y99999", "Z99999", "GP12345", "TEST001", "TEST002", "TEST003",
];

/// Read-only lookup data used by validation rules.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceData {
    pub gp_practices: BTreeMap<String, GpPractice>,
}

impl ReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference data carrying the standard test practices
    /// (`SEED_PRACTICE_CODES` plus `GP0001`..`GP0020`).
    pub fn seeded() -> Self {
        let mut data = Self::new();
        data.extend(
            SEED_PRACTICE_CODES
                .iter()
                .map(|code| GpPractice::new(*code))
                .chain((1..=20).map(|n| GpPractice::new(format!("GP{n:04}")))),
        );
        data
    }

    pub fn extend(&mut self, practices: impl IntoIterator<Item = GpPractice>) {
        for practice in practices {
            self.gp_practices.insert(practice.code.clone(), practice);
        }
    }

    pub fn has_practice(&self, code: &str) -> bool {
        self.gp_practices.contains_key(code)
    }
}
