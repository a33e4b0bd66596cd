//! Fragments: parts of a rerun that can be replayed on their own.
//!
//! Wrapping a body with [`fragment`] yields a [`Fragment`]. Calling it during
//! a rerun runs the body in its own container and stores a replay closure in
//! the session's [`FragmentStorage`], so a later "rerun just this fragment"
//! request replays against the container snapshot taken at the call.

mod core;
mod interval;
mod storage;

pub use self::core::{Fragment, fragment, fragment_id};
pub use interval::{RunEvery, parse_interval};
pub use storage::{FragmentFn, FragmentStorage, MemoryFragmentStorage};
