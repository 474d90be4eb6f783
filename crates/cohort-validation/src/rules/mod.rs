//! Built-in validation rules.

pub mod identity;
pub mod name;
pub mod postcode;
pub mod provider;

use std::sync::Arc;

pub use identity::{NhsNumberConsistencyRule, NhsNumberPresentRule};
pub use name::NamePresentRule;
pub use postcode::PostcodePresentRule;
pub use provider::PrimaryCareProviderRule;

use crate::config::ValidationConfig;
use crate::rule::ValidationRule;

/// The standard rule set, in registration order.
pub fn default_rules(config: &ValidationConfig) -> Vec<Arc<dyn ValidationRule>> {
    vec![
        Arc::new(PrimaryCareProviderRule),
        Arc::new(NhsNumberPresentRule),
        Arc::new(NhsNumberConsistencyRule),
        Arc::new(NamePresentRule),
        Arc::new(PostcodePresentRule::new(
            config.postcode_min_len,
            config.postcode_max_len,
        )),
    ]
}

/// Message used by every rule that needs a demographic row.
pub(crate) const NO_DEMOGRAPHIC: &str = "No demographic record found";

/// `None`, or text that is empty after trimming.
pub(crate) fn is_missing(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
