use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use uuid::Uuid;

use crate::cursor::{ContainerHandle, ContainerStack, DeltaPath, ElementKind, RootContainer};
use crate::error::{RerunError, Result};
use crate::fragment::{FragmentStorage, MemoryFragmentStorage};
use crate::logging::{LogLevel, event_with_fields, json_kv, json_str};
use crate::metrics::{MetricSnapshot, SessionMetrics};
use crate::protocol::{ForwardMsg, ForwardMsgQueue};
use crate::registry::{NavigationIntent, PageHash, PagesManager};

mod config;
mod session_state;

pub use self::config::RuntimeConfig;
pub use self::session_state::{SessionState, SessionStateError};

pub(crate) const NAVIGATION_TARGET: &str = "session_nav::navigation";
pub(crate) const FRAGMENT_TARGET: &str = "session_nav::fragment";
pub(crate) const RUNTIME_TARGET: &str = "session_nav::runtime";

/// Runs page scripts on behalf of the session. The crate only decides which
/// script runs; executing it belongs to the embedder.
pub trait ScriptExecutor: Send + Sync {
    fn execute(&self, ctx: &mut ScriptRunContext, path: &Path) -> Result<()>;
}

/// Which fragment owns the elements currently being written, and the
/// container that was active when it was called. Interactive elements
/// must land inside that container's subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentMarker {
    pub id: String,
    pub container: DeltaPath,
}

/// Undo action run when the guard drops, so it also fires while a panic
/// unwinds through the scope.
struct Restore<'a, F: FnOnce(&mut ScriptRunContext)> {
    ctx: &'a mut ScriptRunContext,
    undo: Option<F>,
}

impl<F: FnOnce(&mut ScriptRunContext)> Drop for Restore<'_, F> {
    fn drop(&mut self) {
        if let Some(undo) = self.undo.take() {
            undo(self.ctx);
        }
    }
}

/// Everything one session carries from rerun to rerun.
///
/// The context is handed by `&mut` to navigation, pages and fragments. One
/// session runs one rerun at a time, so nothing in here is locked.
pub struct ScriptRunContext {
    session_id: Uuid,
    config: RuntimeConfig,
    pages_manager: PagesManager,
    fragment_storage: Box<dyn FragmentStorage>,
    queue: ForwardMsgQueue,
    containers: ContainerStack,
    current_fragment: Option<FragmentMarker>,
    fragment_ids_this_run: Vec<String>,
    page_script_hash: Option<PageHash>,
    session_state: SessionState,
    executor: Option<Arc<dyn ScriptExecutor>>,
    started: Instant,
}

impl ScriptRunContext {
    pub fn new(main_script_path: impl Into<PathBuf>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            config: RuntimeConfig::default(),
            pages_manager: PagesManager::new(main_script_path),
            fragment_storage: Box::new(MemoryFragmentStorage::new()),
            queue: ForwardMsgQueue::new(),
            containers: ContainerStack::default(),
            current_fragment: None,
            fragment_ids_this_run: Vec::new(),
            page_script_hash: None,
            session_state: SessionState::new(),
            executor: None,
            started: Instant::now(),
        }
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self.log(
            LogLevel::Info,
            RUNTIME_TARGET,
            "config_loaded",
            [
                json_kv("show_sidebar_navigation", self.config.show_sidebar_navigation),
                json_kv("metrics", self.config.metrics.is_some()),
            ],
        );
        self
    }

    pub fn with_executor<E>(mut self, executor: E) -> Self
    where
        E: ScriptExecutor + 'static,
    {
        self.executor = Some(Arc::new(executor));
        self
    }

    pub fn with_fragment_storage(mut self, storage: Box<dyn FragmentStorage>) -> Self {
        self.fragment_storage = storage;
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RuntimeConfig {
        &mut self.config
    }

    pub fn session_state(&self) -> &SessionState {
        &self.session_state
    }

    pub fn pages_manager(&self) -> &PagesManager {
        &self.pages_manager
    }

    pub fn pages_manager_mut(&mut self) -> &mut PagesManager {
        &mut self.pages_manager
    }

    /// Record which page the user asked for. Read by the next `navigation` call.
    pub fn set_navigation_intent(&mut self, intent: NavigationIntent) {
        self.pages_manager.set_intent(intent);
    }

    /// Hash of the page navigation selected for the current rerun.
    pub fn page_script_hash(&self) -> Option<&str> {
        self.page_script_hash.as_deref()
    }

    pub fn set_page_script_hash(&mut self, hash: impl Into<PageHash>) {
        self.page_script_hash = Some(hash.into());
    }

    /// Run `f` with the page manager's active hash set to `hash`. The previous
    /// hash is put back whether `f` succeeds or not.
    pub fn run_with_active_hash<T, F>(&mut self, hash: impl Into<PageHash>, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let previous = self.pages_manager.set_active_script_hash(Some(hash.into()));
        self.scoped(
            move |ctx| {
                ctx.pages_manager.set_active_script_hash(previous);
            },
            f,
        )
    }

    /// Run `f`, then `undo`. `undo` runs on success, on error and while
    /// unwinding.
    pub(crate) fn scoped<T, U, F>(&mut self, undo: U, f: F) -> Result<T>
    where
        U: FnOnce(&mut Self),
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let mut guard = Restore {
            ctx: self,
            undo: Some(undo),
        };
        f(&mut *guard.ctx)
    }

    // Outbound messages

    pub fn enqueue(&mut self, msg: ForwardMsg) {
        let kind = msg.kind();
        let replaced = self.queue.enqueue(msg);
        self.record_metric(SessionMetrics::record_enqueued);
        self.log(
            LogLevel::Trace,
            RUNTIME_TARGET,
            "message_enqueued",
            [json_str("kind", kind), json_kv("replaced", replaced)],
        );
    }

    pub fn queued(&self) -> &[ForwardMsg] {
        self.queue.pending()
    }

    pub fn drain_messages(&mut self) -> Vec<ForwardMsg> {
        self.queue.drain()
    }

    // Containers

    pub fn containers(&self) -> &ContainerStack {
        &self.containers
    }

    pub fn restore_containers(&mut self, snapshot: ContainerStack) {
        self.containers = snapshot;
    }

    pub fn new_container(&mut self) -> ContainerHandle {
        self.containers.new_container()
    }

    /// Run `f` with `container` as the active container. The container is
    /// left again even when `f` fails or panics.
    pub fn with_container<T, F>(&mut self, container: &ContainerHandle, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.containers.push(container);
        self.scoped(
            |ctx| {
                ctx.containers.pop();
            },
            f,
        )
    }

    /// Run `f` with writes going to the top of `root`, e.g. the sidebar.
    pub fn with_root<T, F>(&mut self, root: RootContainer, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.containers.enter_root(root);
        self.scoped(
            |ctx| {
                ctx.containers.pop();
            },
            f,
        )
    }

    /// Reserve the next slot in the active container for an element.
    ///
    /// Inside a fragment, interactive elements must stay within the
    /// container that was active when the fragment was called, or one of
    /// its descendants.
    pub fn write_element(&mut self, kind: ElementKind) -> Result<DeltaPath> {
        if kind == ElementKind::Interactive {
            if let Some(marker) = &self.current_fragment {
                if !self.containers.active().is_within(&marker.container) {
                    return Err(RerunError::FragmentOutsideContainer);
                }
            }
        }
        Ok(self.containers.allocate())
    }

    // Fragments

    pub fn fragment_storage(&self) -> &dyn FragmentStorage {
        self.fragment_storage.as_ref()
    }

    pub fn fragment_storage_mut(&mut self) -> &mut dyn FragmentStorage {
        self.fragment_storage.as_mut()
    }

    pub fn current_fragment_id(&self) -> Option<&str> {
        self.current_fragment.as_ref().map(|marker| marker.id.as_str())
    }

    /// Swap the current-fragment marker, returning the previous one.
    pub fn replace_fragment_marker(
        &mut self,
        marker: Option<FragmentMarker>,
    ) -> Option<FragmentMarker> {
        std::mem::replace(&mut self.current_fragment, marker)
    }

    /// True while `run_fragments` is replaying stored fragments.
    pub fn is_fragment_run(&self) -> bool {
        !self.fragment_ids_this_run.is_empty()
    }

    pub fn fragment_ids_this_run(&self) -> &[String] {
        &self.fragment_ids_this_run
    }

    pub(crate) fn note_fragment_registered(&self, id: &str, name: &str) {
        self.record_metric(SessionMetrics::record_fragment_registered);
        self.log(
            LogLevel::Debug,
            FRAGMENT_TARGET,
            "fragment_registered",
            [json_str("fragment_id", id), json_str("name", name)],
        );
    }

    /// Rerun only the given fragments instead of the whole script. Stops at
    /// the first fragment that is missing or fails.
    pub fn run_fragments(&mut self, ids: &[String]) -> Result<()> {
        self.fragment_ids_this_run = ids.to_vec();
        self.scoped(
            |ctx| ctx.fragment_ids_this_run.clear(),
            |ctx| ctx.replay_fragments(ids),
        )
    }

    fn replay_fragments(&mut self, ids: &[String]) -> Result<()> {
        for id in ids {
            let replay = self.fragment_storage.get(id)?;
            self.log(
                LogLevel::Debug,
                FRAGMENT_TARGET,
                "fragment_replayed",
                [json_str("fragment_id", id.as_str())],
            );
            replay(self)?;
            self.record_metric(|metrics| metrics.record_fragment_replays(1));
        }
        Ok(())
    }

    // Rerun lifecycle

    /// Reset per-rerun state before the entrypoint runs again from the top.
    pub fn start_rerun(&mut self) {
        self.containers.reset();
        self.current_fragment = None;
        self.fragment_ids_this_run.clear();
        self.page_script_hash = None;
        self.log(
            LogLevel::Debug,
            RUNTIME_TARGET,
            "rerun_started",
            [json_str("session_id", self.session_id.to_string())],
        );
    }

    /// Session teardown. Stored fragments, pending messages and session
    /// state are dropped.
    pub fn clear_session(&mut self) -> Result<()> {
        self.fragment_storage.clear();
        self.queue.clear();
        self.session_state.clear()?;
        self.log(
            LogLevel::Info,
            RUNTIME_TARGET,
            "session_cleared",
            [json_str("session_id", self.session_id.to_string())],
        );
        Ok(())
    }

    pub fn exec_script(&mut self, path: &Path) -> Result<()> {
        let executor = self
            .executor
            .clone()
            .ok_or_else(|| RerunError::NoScriptExecutor(path.to_path_buf()))?;
        self.log(
            LogLevel::Debug,
            RUNTIME_TARGET,
            "script_started",
            [json_str("path", path.display().to_string())],
        );
        executor.execute(self, path)
    }

    // Observability

    pub fn metrics_snapshot(&self) -> Option<MetricSnapshot> {
        let metrics = self.config.metrics.as_ref()?;
        let guard = metrics.lock().ok()?;
        Some(guard.snapshot(self.started.elapsed()))
    }

    /// Write the current metrics snapshot to the configured logger.
    pub fn emit_metrics(&self) {
        if let (Some(logger), Some(snapshot)) =
            (self.config.logger.as_ref(), self.metrics_snapshot())
        {
            let event = snapshot.to_log_event(&self.config.metrics_target);
            let _ = logger.log_event(event);
        }
    }

    pub(crate) fn log<I>(&self, level: LogLevel, target: &str, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.config.logger.as_ref() {
            if !logger.enabled(level) {
                return;
            }
            let mut event = event_with_fields(level, target, message, fields);
            event
                .fields
                .insert("session_id".to_string(), json!(self.session_id.to_string()));
            let _ = logger.log_event(event);
        }
    }

    pub(crate) fn record_metric<F>(&self, record: F)
    where
        F: FnOnce(&mut SessionMetrics),
    {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                record(&mut *guard);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{Logger, MemorySink};
    use crate::protocol::{AutoRerun, PageNotFound};
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::Mutex;

    fn ctx() -> ScriptRunContext {
        ScriptRunContext::new("/app/main.py")
    }

    struct RecordingExecutor {
        runs: Arc<Mutex<Vec<(PathBuf, Option<String>)>>>,
    }

    impl ScriptExecutor for RecordingExecutor {
        fn execute(&self, ctx: &mut ScriptRunContext, path: &Path) -> Result<()> {
            let hash = ctx.pages_manager().active_script_hash().map(str::to_string);
            self.runs.lock().unwrap().push((path.to_path_buf(), hash));
            Ok(())
        }
    }

    #[test]
    fn active_hash_is_restored_after_failure() {
        let mut ctx = ctx();
        ctx.pages_manager_mut()
            .set_active_script_hash(Some("outer".into()));
        let err = ctx
            .run_with_active_hash("inner", |ctx| {
                assert_eq!(ctx.pages_manager().active_script_hash(), Some("inner"));
                Err::<(), _>(RerunError::script("boom"))
            })
            .unwrap_err();
        assert!(matches!(err, RerunError::Script(_)));
        assert_eq!(ctx.pages_manager().active_script_hash(), Some("outer"));
    }

    #[test]
    fn interactive_writes_are_checked_against_the_fragment_container() {
        let mut ctx = ctx();
        let placement = ctx.new_container();
        ctx.replace_fragment_marker(Some(FragmentMarker {
            id: "frag".into(),
            container: placement.path().clone(),
        }));

        let err = ctx
            .with_root(RootContainer::Sidebar, |ctx| {
                ctx.write_element(ElementKind::Interactive)
            })
            .unwrap_err();
        assert!(matches!(err, RerunError::FragmentOutsideContainer));
        assert!(
            ctx.with_root(RootContainer::Sidebar, |ctx| ctx.write_element(ElementKind::Display))
                .is_ok()
        );

        let nested = ctx
            .with_container(&placement, |ctx| {
                let child = ctx.new_container();
                ctx.with_container(&child, |ctx| ctx.write_element(ElementKind::Interactive))
            })
            .unwrap();
        assert!(nested.is_within(placement.path()));
    }

    #[test]
    fn with_root_writes_to_the_sidebar_and_comes_back() {
        let mut ctx = ctx();
        let path = ctx
            .with_root(RootContainer::Sidebar, |ctx| ctx.write_element(ElementKind::Display))
            .unwrap();
        assert!(path.is_within(&DeltaPath::root(RootContainer::Sidebar)));
        assert_eq!(ctx.containers().active(), &DeltaPath::root(RootContainer::Main));
    }

    #[test]
    fn scopes_are_unwound_when_the_body_panics() {
        let mut ctx = ctx();
        ctx.pages_manager_mut()
            .set_active_script_hash(Some("outer".into()));
        let container = ctx.new_container();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            ctx.run_with_active_hash("inner", |ctx| {
                ctx.with_container(&container, |_ctx| -> Result<()> { panic!("page blew up") })
            })
        }));
        assert!(outcome.is_err());
        assert_eq!(ctx.pages_manager().active_script_hash(), Some("outer"));
        assert_eq!(ctx.containers().depth(), 1);
    }

    #[test]
    fn replay_ids_are_cleared_when_a_fragment_panics() {
        let mut ctx = ctx();
        ctx.fragment_storage_mut().set(
            "frag",
            Arc::new(|_ctx: &mut ScriptRunContext| -> Result<()> { panic!("fragment blew up") }),
        );
        let outcome = catch_unwind(AssertUnwindSafe(|| ctx.run_fragments(&["frag".to_string()])));
        assert!(outcome.is_err());
        assert!(!ctx.is_fragment_run());
    }

    #[test]
    fn writes_outside_fragments_are_unrestricted() {
        let mut ctx = ctx();
        let path = ctx.write_element(ElementKind::Interactive).unwrap();
        assert_eq!(path, DeltaPath::root(RootContainer::Main).child(0));
    }

    #[test]
    fn container_is_left_when_the_body_fails() {
        let mut ctx = ctx();
        let container = ctx.new_container();
        let _ = ctx.with_container(&container, |_ctx| Err::<(), _>(RerunError::script("x")));
        assert_eq!(ctx.containers().depth(), 1);
    }

    #[test]
    fn enqueue_coalesces_and_counts() {
        let mut config = RuntimeConfig::default();
        config.enable_metrics();
        let mut ctx = ctx().with_config(config);

        ctx.enqueue(ForwardMsg::PageNotFound(PageNotFound::default()));
        for interval in [1.0, 2.0] {
            ctx.enqueue(ForwardMsg::AutoRerun(AutoRerun {
                interval,
                fragment_id: "frag".into(),
            }));
        }
        assert_eq!(ctx.queued().len(), 2);
        assert_eq!(ctx.metrics_snapshot().unwrap().messages_enqueued, 3);

        let drained = ctx.drain_messages();
        assert_eq!(drained[1].as_auto_rerun().unwrap().interval, 2.0);
        assert!(ctx.queued().is_empty());
    }

    #[test]
    fn run_fragments_reports_missing_ids() {
        let mut ctx = ctx();
        let err = ctx.run_fragments(&["missing".to_string()]).unwrap_err();
        assert!(matches!(err, RerunError::FragmentNotFound(id) if id == "missing"));
        assert!(!ctx.is_fragment_run());
    }

    #[test]
    fn run_fragments_marks_the_run() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let observed = Arc::clone(&seen);
        let mut ctx = ctx();
        ctx.fragment_storage_mut().set(
            "frag",
            Arc::new(move |ctx: &mut ScriptRunContext| {
                observed
                    .lock()
                    .unwrap()
                    .push(ctx.fragment_ids_this_run().to_vec());
                Ok(())
            }),
        );

        ctx.run_fragments(&["frag".to_string()]).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![vec!["frag".to_string()]]);
        assert!(!ctx.is_fragment_run());
    }

    #[test]
    fn exec_script_requires_an_executor() {
        let mut ctx = ctx();
        let err = ctx.exec_script(Path::new("/app/page.py")).unwrap_err();
        assert!(matches!(err, RerunError::NoScriptExecutor(_)));

        let runs = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = ScriptRunContext::new("/app/main.py").with_executor(RecordingExecutor {
            runs: Arc::clone(&runs),
        });
        ctx.run_with_active_hash("abc", |ctx| ctx.exec_script(Path::new("/app/page.py")))
            .unwrap();
        assert_eq!(
            *runs.lock().unwrap(),
            vec![(PathBuf::from("/app/page.py"), Some("abc".to_string()))]
        );
    }

    #[test]
    fn clear_session_drops_fragments_and_state() {
        let mut ctx = ctx();
        ctx.fragment_storage_mut()
            .set("frag", Arc::new(|_ctx: &mut ScriptRunContext| Ok(())));
        ctx.session_state().insert("count", 3).unwrap();
        ctx.clear_session().unwrap();
        assert!(ctx.fragment_storage().is_empty());
        assert!(!ctx.session_state().contains("count"));
    }

    #[test]
    fn start_rerun_resets_cursor_and_marker() {
        let mut ctx = ctx();
        ctx.write_element(ElementKind::Display).unwrap();
        ctx.set_page_script_hash("abc");
        ctx.replace_fragment_marker(Some(FragmentMarker {
            id: "frag".into(),
            container: DeltaPath::root(RootContainer::Main),
        }));
        ctx.start_rerun();
        assert_eq!(ctx.containers(), &ContainerStack::default());
        assert!(ctx.current_fragment_id().is_none());
        assert!(ctx.page_script_hash().is_none());
    }

    #[test]
    fn log_events_carry_the_session_id() {
        let sink = MemorySink::new();
        let config = RuntimeConfig::default().with_logger(Logger::new(sink.clone()));
        let mut ctx = ctx().with_config(config);
        ctx.start_rerun();

        let events = sink.events();
        let rerun = events
            .iter()
            .find(|event| event.message == "rerun_started")
            .unwrap();
        assert_eq!(rerun.target, RUNTIME_TARGET);
        assert_eq!(
            rerun.field("session_id"),
            Some(&json!(ctx.session_id().to_string()))
        );
    }

    #[test]
    fn metrics_snapshot_is_logged() {
        let sink = MemorySink::new();
        let mut config = RuntimeConfig::default().with_logger(Logger::new(sink.clone()));
        config.enable_metrics();
        let ctx = ctx().with_config(config);
        ctx.emit_metrics();
        assert!(sink.messages().contains(&"session_metrics".to_string()));
    }
}
