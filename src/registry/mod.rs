//! Page registry orchestrator.
//!
//! The registry is the per-session table of pages declared by the most recent
//! rerun, keyed by page identity hash, plus the navigation intent the
//! browser sent and the hash of the page currently executing.

mod core;

pub use self::core::{NavigationIntent, PageHash, PageInfo, PagesManager};
