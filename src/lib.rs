//! Session rerun and page navigation control loop.
//!
//! Every user interaction reruns the app entrypoint from the top. On each
//! rerun the entrypoint calls [`navigation`] with the pages it declares; the
//! returned [`Page`] is the one page allowed to run. Fragments wrap parts of
//! a page so they can be replayed on their own without a full rerun.
//!
//! All per-session state lives in a [`ScriptRunContext`] handed around by
//! `&mut`. The modules follow the RSB `MODULE_SPEC` pattern: each directory
//! module's `mod.rs` is the orchestrator and re-exports its public surface.

pub mod cursor;
pub mod error;
pub mod fragment;
pub mod logging;
pub mod metrics;
pub mod navigation;
pub mod pages;
pub mod protocol;
pub mod registry;
pub mod runtime;

pub use cursor::{ContainerHandle, ContainerStack, DeltaPath, ElementKind, RootContainer};
pub use error::{ErrorKind, RerunError, Result};
pub use fragment::{
    Fragment, FragmentFn, FragmentStorage, MemoryFragmentStorage, RunEvery, fragment, fragment_id,
    parse_interval,
};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink,
};
pub use metrics::{MetricSnapshot, SessionMetrics};
pub use navigation::{NavigationOptions, NavigationPages, navigation};
pub use pages::{Page, PageCallable, PageFn, PageInput, PageOptions, PageSource};
pub use protocol::{
    AppPage, AutoRerun, ForwardMsg, ForwardMsgQueue, NavigationMsg, PageNotFound, Position,
};
pub use registry::{NavigationIntent, PageHash, PageInfo, PagesManager};
pub use runtime::{
    FragmentMarker, RuntimeConfig, ScriptExecutor, ScriptRunContext, SessionState,
    SessionStateError,
};
