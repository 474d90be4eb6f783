use serde::{Deserialize, Serialize};

/// Configuration for the validation engine and its built-in rules.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Shortest post code (after trimming) not flagged as unusual.
    pub postcode_min_len: usize,
    /// Longest post code (after trimming) not flagged as unusual.
    pub postcode_max_len: usize,
    /// Evaluate rules as concurrent tasks. When `false` rules run inline,
    /// one after another.
    pub parallel_rules: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            postcode_min_len: 5,
            postcode_max_len: 8,
            parallel_rules: true,
        }
    }
}
