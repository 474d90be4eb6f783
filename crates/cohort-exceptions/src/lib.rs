//! # cohort-exceptions
//!
//! Records rule failures raised while a file moves through the pipeline and
//! lets operators resolve them per participant.
//!
//! - [`ExceptionSink`]: create, resolve and list exceptions
//! - [`InMemoryExceptionSink`]: lock-guarded implementation for tests, the
//!   CLI and the server

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{ExceptionError, Result};
pub use memory::InMemoryExceptionSink;
pub use traits::ExceptionSink;
pub use types::{ExceptionEntry, NewException, Resolution};
