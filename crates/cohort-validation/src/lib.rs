//! Validation engine for the cohort pipeline.
//!
//! Every participant loaded from a cohort file is checked against an ordered
//! list of business rules before it can be transformed and distributed. The
//! engine runs the rules concurrently and returns one result per rule, always
//! in registration order.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cohort_store::InMemoryStore;
//! use cohort_types::{ParticipantKey, ReferenceData};
//! use cohort_validation::{ValidationConfig, ValidationEngine};
//!
//! # async fn run() -> Result<(), cohort_validation::ValidationError> {
//! let store = Arc::new(InMemoryStore::with_reference(ReferenceData::seeded()));
//! let engine = ValidationEngine::with_default_rules(store, ValidationConfig::default());
//! let outcome = engine.validate(ParticipantKey::new(9000000009)).await?;
//! println!("passed: {}", outcome.passed());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod rule;
pub mod rules;

pub use config::ValidationConfig;
pub use engine::{ParticipantValidation, ValidationEngine, PARTICIPANT_EXISTS};
pub use error::ValidationError;
pub use rule::{RuleInput, Severity, ValidationResult, ValidationRule, ValidationSummary};
pub use rules::{
    default_rules, NamePresentRule, NhsNumberConsistencyRule, NhsNumberPresentRule,
    PostcodePresentRule, PrimaryCareProviderRule,
};
