use std::sync::Arc;

use crate::cursor::{ContainerStack, DeltaPath};
use crate::error::Result;
use crate::protocol::{AutoRerun, ForwardMsg};
use crate::runtime::{FragmentMarker, ScriptRunContext};

use super::interval::RunEvery;
use super::storage::FragmentFn;

/// Identifier of a fragment instance: its name plus the container it was
/// called from. Stable across reruns while that container keeps its place.
pub fn fragment_id(name: &str, container: &DeltaPath) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(container.to_string().as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// A replayable unit of page code.
#[derive(Clone)]
pub struct Fragment {
    name: String,
    body: FragmentFn,
    run_every: Option<RunEvery>,
}

/// Wrap `body` as a fragment. `name` must be unique among the fragments
/// called from the same container.
pub fn fragment<F>(name: impl Into<String>, body: F) -> Fragment
where
    F: Fn(&mut ScriptRunContext) -> Result<()> + Send + Sync + 'static,
{
    Fragment {
        name: name.into(),
        body: Arc::new(body),
        run_every: None,
    }
}

impl Fragment {
    /// Ask the browser-side scheduler to replay this fragment periodically.
    pub fn run_every(mut self, interval: impl Into<RunEvery>) -> Self {
        self.run_every = Some(interval.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the fragment as part of the current rerun.
    ///
    /// Stores a fresh replay closure under the fragment's id (replacing the
    /// one from the previous call), schedules periodic reruns when an
    /// interval is set, then runs the body. Errors from the body propagate
    /// after the current-fragment marker has been restored. Without a
    /// session context the call does nothing.
    pub fn call(&self, ctx: Option<&mut ScriptRunContext>) -> Result<()> {
        let Some(ctx) = ctx else {
            return Ok(());
        };

        let interval = match &self.run_every {
            Some(run_every) => Some(run_every.to_seconds()?),
            None => None,
        };

        let snapshot = ctx.containers().clone();
        let id = fragment_id(&self.name, snapshot.active());
        let page_hash = ctx
            .pages_manager()
            .active_script_hash()
            .map(str::to_string);

        let replay = self.capture(id.clone(), snapshot, page_hash);
        ctx.fragment_storage_mut().set(&id, Arc::clone(&replay));
        ctx.note_fragment_registered(&id, &self.name);

        if let Some(interval) = interval.filter(|seconds| *seconds > 0.0) {
            ctx.enqueue(ForwardMsg::AutoRerun(AutoRerun {
                interval,
                fragment_id: id.clone(),
            }));
        }

        replay(ctx)
    }

    fn capture(
        &self,
        id: String,
        snapshot: ContainerStack,
        page_hash: Option<String>,
    ) -> FragmentFn {
        let body = Arc::clone(&self.body);
        Arc::new(move |ctx: &mut ScriptRunContext| {
            if ctx.is_fragment_run() {
                ctx.restore_containers(snapshot.clone());
            }
            let id = id.clone();
            let body = Arc::clone(&body);
            match &page_hash {
                Some(hash) => {
                    ctx.run_with_active_hash(hash.clone(), move |ctx| run_scoped(ctx, id, &body))
                }
                None => run_scoped(ctx, id, &body),
            }
        })
    }
}

/// Run `body` inside a new container with the fragment marker set. The
/// marker points at the container active at the call, so the body may write
/// interactive elements anywhere below it. The previous marker comes back
/// on success, on error and while unwinding.
fn run_scoped(ctx: &mut ScriptRunContext, id: String, body: &FragmentFn) -> Result<()> {
    let placement = ctx.containers().active().clone();
    let container = ctx.new_container();
    let prior = ctx.replace_fragment_marker(Some(FragmentMarker {
        id,
        container: placement,
    }));
    ctx.scoped(
        move |ctx| {
            ctx.replace_fragment_marker(prior);
        },
        |ctx| ctx.with_container(&container, |ctx| body(ctx)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{ElementKind, RootContainer};
    use crate::error::RerunError;
    use crate::fragment::FragmentStorage;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx() -> ScriptRunContext {
        ScriptRunContext::new("/app/main.py")
    }

    fn only_stored_id(ctx: &ScriptRunContext) -> String {
        assert_eq!(ctx.fragment_storage().len(), 1);
        ctx.fragment_storage().keys().into_iter().next().unwrap()
    }

    #[test]
    fn calls_body_inside_a_new_container() {
        let depths = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&depths);
        let frag = fragment("my_fragment", move |ctx| {
            seen.lock().unwrap().push(ctx.containers().depth());
            Ok(())
        });

        let mut ctx = ctx();
        let before = ctx.containers().depth();
        frag.call(Some(&mut ctx)).unwrap();
        assert_eq!(*depths.lock().unwrap(), vec![before + 1]);
        assert_eq!(ctx.containers().depth(), before);
    }

    #[test]
    fn without_context_nothing_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let frag = fragment("noop", move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        frag.call(None).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn marker_is_set_during_body_and_restored_after() {
        let frag = fragment("marked", |ctx| {
            assert!(ctx.current_fragment_id().is_some());
            Ok(())
        });
        let mut ctx = ctx();
        let outer = FragmentMarker {
            id: "outer_id".into(),
            container: ctx.containers().active().clone(),
        };
        ctx.replace_fragment_marker(Some(outer));
        frag.call(Some(&mut ctx)).unwrap();
        assert_eq!(ctx.current_fragment_id(), Some("outer_id"));
    }

    #[test]
    fn marker_is_restored_when_body_fails() {
        let frag = fragment("exploding", |_ctx| Err(RerunError::script("oh no")));
        let mut ctx = ctx();
        let err = frag.call(Some(&mut ctx)).unwrap_err();
        assert!(matches!(err, RerunError::Script(message) if message == "oh no"));
        assert_eq!(ctx.current_fragment_id(), None);
        assert_eq!(ctx.containers().depth(), 1);
    }

    #[test]
    fn panicking_body_leaves_the_context_clean() {
        let frag = fragment("panicky", |ctx| {
            ctx.write_element(ElementKind::Display)?;
            panic!("widget blew up");
        });
        let mut ctx = ctx();
        ctx.pages_manager_mut()
            .set_active_script_hash(Some("outer".into()));

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            ctx.run_with_active_hash("page", |ctx| frag.call(Some(ctx)))
        }));
        assert!(outcome.is_err());
        assert_eq!(ctx.current_fragment_id(), None);
        assert_eq!(ctx.containers().depth(), 1);
        assert_eq!(ctx.pages_manager().active_script_hash(), Some("outer"));

        // The next call starts from a clean slate.
        let ok = fragment("after", |ctx| ctx.write_element(ElementKind::Interactive).map(drop));
        ok.call(Some(&mut ctx)).unwrap();
        assert_eq!(ctx.current_fragment_id(), None);
    }

    #[test]
    fn replay_closure_is_stored_and_overwritten() {
        let frag = fragment("stored", |_ctx| Ok(()));
        let mut ctx = ctx();
        frag.call(Some(&mut ctx)).unwrap();
        let id = only_stored_id(&ctx);
        assert_eq!(id, fragment_id("stored", &DeltaPath::root(RootContainer::Main)));

        ctx.start_rerun();
        frag.call(Some(&mut ctx)).unwrap();
        assert_eq!(only_stored_id(&ctx), id);
    }

    #[test]
    fn same_name_in_different_containers_gets_different_ids() {
        let frag = fragment("shared", |_ctx| Ok(()));
        let mut ctx = ctx();
        frag.call(Some(&mut ctx)).unwrap();
        let inner = ctx.new_container();
        ctx.with_container(&inner, |ctx| frag.call(Some(ctx))).unwrap();
        assert_eq!(ctx.fragment_storage().len(), 2);
    }

    #[test]
    fn replays_restore_the_snapshot() {
        let paths = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&paths);
        let frag = fragment("snapshot", move |ctx| {
            let path = ctx.write_element(ElementKind::Display)?;
            seen.lock().unwrap().push(path);
            Ok(())
        });

        let mut ctx = ctx();
        frag.call(Some(&mut ctx)).unwrap();
        let id = only_stored_id(&ctx);
        ctx.run_fragments(&[id.clone()]).unwrap();
        ctx.run_fragments(&[id]).unwrap();

        let paths = paths.lock().unwrap();
        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0], paths[1]);
        assert_eq!(paths[1], paths[2]);
    }

    #[test]
    fn full_rerun_invocations_of_the_closure_use_live_state() {
        let paths = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&paths);
        let frag = fragment("live", move |ctx| {
            let path = ctx.write_element(ElementKind::Display)?;
            seen.lock().unwrap().push(path);
            Ok(())
        });

        let mut ctx = ctx();
        frag.call(Some(&mut ctx)).unwrap();
        let replay = ctx.fragment_storage().get(&only_stored_id(&ctx)).unwrap();
        replay(&mut ctx).unwrap();

        let paths = paths.lock().unwrap();
        assert_ne!(paths[0], paths[1]);
    }

    #[test]
    fn replay_runs_under_the_captured_page_hash() {
        let hashes = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&hashes);
        let frag = fragment("paged", move |ctx| {
            let hash = ctx.pages_manager().active_script_hash().map(str::to_string);
            seen.lock().unwrap().push(hash);
            Ok(())
        });

        let mut ctx = ctx();
        ctx.pages_manager_mut()
            .set_active_script_hash(Some("some_hash".into()));
        frag.call(Some(&mut ctx)).unwrap();
        let id = only_stored_id(&ctx);

        ctx.pages_manager_mut()
            .set_active_script_hash(Some("a_different_hash".into()));
        ctx.run_fragments(&[id]).unwrap();

        let hashes = hashes.lock().unwrap();
        assert_eq!(hashes[1].as_deref(), Some("some_hash"));
        assert_eq!(
            ctx.pages_manager().active_script_hash(),
            Some("a_different_hash")
        );
    }

    #[test]
    fn run_every_enqueues_auto_rerun() {
        let cases: Vec<(Option<RunEvery>, Option<f64>)> = vec![
            (None, None),
            (Some(3u32.into()), Some(3.0)),
            (Some(5.0.into()), Some(5.0)),
            (Some("1 minute".into()), Some(60.0)),
        ];

        for (run_every, expected) in cases {
            let mut frag = fragment("ticker", |_ctx| Ok(()));
            if let Some(run_every) = run_every {
                frag = frag.run_every(run_every);
            }
            let mut ctx = ctx();
            frag.call(Some(&mut ctx)).unwrap();

            let queued = ctx.drain_messages();
            match expected {
                Some(interval) => {
                    assert_eq!(queued.len(), 1);
                    let auto = queued[0].as_auto_rerun().unwrap();
                    assert_eq!(auto.interval, interval);
                    assert_eq!(auto.fragment_id, only_stored_id(&ctx));
                }
                None => assert!(queued.is_empty()),
            }
        }
    }

    #[test]
    fn invalid_interval_aborts_before_storing() {
        let frag = fragment("bad", |_ctx| Ok(())).run_every("whenever");
        let mut ctx = ctx();
        let err = frag.call(Some(&mut ctx)).unwrap_err();
        assert!(err.is_configuration());
        assert!(ctx.fragment_storage().is_empty());
    }

    #[test]
    fn widgets_cannot_escape_the_fragment_container() {
        let mut ctx = ctx();
        let frag = fragment("escape", |ctx| {
            ctx.write_element(ElementKind::Display)?;
            ctx.with_root(RootContainer::Sidebar, |ctx| {
                ctx.write_element(ElementKind::Interactive)
            })?;
            Ok(())
        });

        let err = frag.call(Some(&mut ctx)).unwrap_err();
        assert!(matches!(err, RerunError::FragmentOutsideContainer));
        assert_eq!(ctx.current_fragment_id(), None);
    }

    #[test]
    fn widgets_in_a_sibling_of_the_calling_container_are_allowed() {
        let mut ctx = ctx();
        let sibling = ctx.new_container();
        let frag = fragment("sibling", move |ctx| {
            ctx.with_container(&sibling, |ctx| ctx.write_element(ElementKind::Interactive))?;
            Ok(())
        });
        frag.call(Some(&mut ctx)).unwrap();
    }

    #[test]
    fn widgets_above_the_calling_container_are_rejected() {
        let mut ctx = ctx();
        let outer_sibling = ctx.new_container();
        let inner = ctx.new_container();
        let frag = fragment("nested_call", move |ctx| {
            ctx.with_container(&outer_sibling, |ctx| {
                ctx.write_element(ElementKind::Interactive)
            })?;
            Ok(())
        });

        let err = ctx
            .with_container(&inner, |ctx| frag.call(Some(ctx)))
            .unwrap_err();
        assert!(matches!(err, RerunError::FragmentOutsideContainer));
    }

    #[test]
    fn display_elements_may_escape() {
        let mut ctx = ctx();
        let frag = fragment("display", |ctx| {
            ctx.with_root(RootContainer::Sidebar, |ctx| {
                ctx.write_element(ElementKind::Display)
            })?;
            Ok(())
        });
        frag.call(Some(&mut ctx)).unwrap();
    }

    #[test]
    fn widgets_in_nested_inside_containers_are_allowed() {
        let frag = fragment("inside", |ctx| {
            let inside = ctx.new_container();
            ctx.with_container(&inside, |ctx| {
                let nested = ctx.new_container();
                ctx.with_container(&nested, |ctx| ctx.write_element(ElementKind::Interactive))
            })?;
            Ok(())
        });
        let mut ctx = ctx();
        frag.call(Some(&mut ctx)).unwrap();
    }
}
