//! Error module orchestrator.
//!
//! Every fallible operation in the crate returns [`Result`]; the variants of
//! [`RerunError`] are grouped by [`ErrorKind`] so callers can tell fatal
//! configuration mistakes from lookups on absent keys.

mod types;

pub use types::{ErrorKind, RerunError, Result};
