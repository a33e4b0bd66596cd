//! Outbound protocol messages and the per-session delivery queue.
//!
//! The message contents are load-bearing; the JSON encoding is what the
//! transport in front of the browser forwards.

mod core;
mod queue;

pub use self::core::{AppPage, AutoRerun, ForwardMsg, NavigationMsg, PageNotFound, Position};
pub use queue::ForwardMsgQueue;
