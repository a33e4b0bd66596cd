//! Navigation orchestrator.
//!
//! [`navigation`] is called once per rerun by the app entrypoint. It turns
//! the declared pages into descriptors, picks the default page, publishes the
//! page menu to the browser and hands back the one page allowed to run.

mod core;

pub use self::core::{NavigationOptions, NavigationPages, navigation};
