//! Transformation engine for the cohort pipeline.
//!
//! Participants that pass validation are rewritten into an outbound shape
//! before distribution. Two rule kinds exist:
//!
//! - [`ConditionalRule`]: when a [`Condition`] holds, overwrite declared fields
//! - [`ReplacementRule`]: substring replacement over declared text fields
//!
//! Both sit behind [`TransformationRule`], held in an explicit ordered list
//! by the [`TransformationEngine`]. The engine works on a disconnected copy
//! of the participant's snapshot and never writes to the store; persisting
//! an outbound snapshot is always a separate, explicit step.

pub mod condition;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod rule;

pub use condition::Condition;
pub use config::TransformationConfig;
pub use defaults::{default_conditional_rules, default_replacement_rules};
pub use engine::{
    BatchSummary, BatchTransformation, TransformItem, TransformationEngine,
    TransformationOutcome, TransformationSummary,
};
pub use error::{TransformError, TransformResult};
pub use rule::{
    ConditionalRule, FieldChange, FieldUpdate, ReplacementRule, RuleOutcome, TransformationRule,
    WorkingCopy,
};
