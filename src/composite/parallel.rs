//! # Parallel: run children concurrently.
//!
//! [`Parallel`] launches every child through its callback form and completes once all
//! of them have finished and their done signals are set.
//!
//! ## Result
//! The first failure (by completion order) wins; otherwise `Aborted` if any child was
//! aborted; otherwise success.
//!
//! ## Abort upon failure
//! With `abort_upon_failure`, children are not owned directly. Each one is wrapped in
//! an [`AbortLinked`] root watching the composite, so the composite can abort its
//! siblings after a failure without aborting itself or its own ancestors.
//!
//! ```text
//!  Parallel ─┬─► child A ─┐
//!            ├─► child B ─┼─► Tracker: remaining -= 1, record first error
//!            └─► child C ─┘       │ (first failure + abort_upon_failure ─► abort all)
//!                                 ▼
//!                      remaining == 0 ─► all done signals set ─► completion.deliver
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::actions::{
    Action, ActionCore, ActionExt, ActionRef, Completion, Outcome, SyncAction, bind,
    block_on_callback,
};
use crate::error::{ActionError, UsageError};
use crate::signals::{Signal, on_all_set};
use crate::wrappers::AbortLinked;

enum Member {
    Owned(ActionRef),
    Linked(Arc<SyncAction<AbortLinked>>),
}

impl Member {
    fn runnable(&self) -> ActionRef {
        match self {
            Member::Owned(action) => Arc::clone(action),
            Member::Linked(linked) => linked.clone(),
        }
    }
}

/// Composite running its children concurrently.
pub struct Parallel {
    core: ActionCore,
    abort_upon_failure: bool,
    children: Mutex<Vec<Member>>,
}

impl Parallel {
    /// Creates an empty composite.
    pub fn new(abort_upon_failure: bool) -> Arc<Self> {
        bind(Self {
            core: ActionCore::new(),
            abort_upon_failure,
            children: Mutex::new(Vec::new()),
        })
    }

    /// Creates a composite over `actions`.
    pub fn from_actions<I>(abort_upon_failure: bool, actions: I) -> Result<Arc<Self>, UsageError>
    where
        I: IntoIterator<Item = ActionRef>,
    {
        let parallel = Self::new(abort_upon_failure);
        for action in actions {
            parallel.add(action)?;
        }
        Ok(parallel)
    }

    /// True if a failing child aborts its siblings.
    pub fn abort_upon_failure(&self) -> bool {
        self.abort_upon_failure
    }

    /// Adds a child.
    pub fn add(&self, action: ActionRef) -> Result<(), UsageError> {
        let member = if self.abort_upon_failure {
            let this = self.core.this().ok_or_else(|| UsageError::Unbound {
                action: self.name().to_string(),
            })?;
            Member::Linked(AbortLinked::new(action, &this)?)
        } else {
            self.take_ownership(Arc::clone(&action))?;
            Member::Owned(action)
        };
        self.children.lock().push(member);
        Ok(())
    }

    /// Releases every child.
    pub fn clear(&self) -> Result<(), UsageError> {
        let children = std::mem::take(&mut *self.children.lock());
        for child in &children {
            match child {
                Member::Owned(action) => self.relinquish_ownership(action)?,
                Member::Linked(linked) => linked.relinquish_ownership(linked.inner())?,
            }
        }
        Ok(())
    }

    /// The actions this composite launches (the linked wrappers when
    /// `abort_upon_failure` is set).
    pub fn runnables(&self) -> Vec<ActionRef> {
        self.children.lock().iter().map(Member::runnable).collect()
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.children.lock().len()
    }

    /// True if the composite has no children.
    pub fn is_empty(&self) -> bool {
        self.children.lock().is_empty()
    }
}

impl Action for Parallel {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn name(&self) -> &str {
        "Parallel"
    }

    fn extended_description(&self) -> String {
        format!(
            "Number of actions: {}; Abort upon failure? {}",
            self.len(),
            self.abort_upon_failure
        )
    }

    fn is_naturally_synchronous(&self) -> bool {
        false
    }

    fn execute_blocking(&self) -> Result<(), ActionError> {
        block_on_callback(self)
    }

    fn execute_callback(&self, completion: Completion) -> Result<(), ActionError> {
        let runnables = self.runnables();
        if runnables.is_empty() {
            completion.deliver(Ok(()));
            return Ok(());
        }

        let tracker = Arc::new(Tracker {
            remaining: AtomicUsize::new(runnables.len()),
            runnables,
            abort_upon_failure: self.abort_upon_failure,
            aborted: AtomicBool::new(false),
            first_error: Mutex::new(None),
            completion: Mutex::new(Some(completion)),
        });

        for runnable in &tracker.runnables {
            let t = Arc::clone(&tracker);
            let launched = runnable.async_execute(move |outcome: Outcome| {
                t.on_child_finished(outcome.into_result());
            });
            if let Err(err) = launched {
                tracing::warn!(action = %runnable.description(), error = %err, "parallel child failed to launch");
                tracker.on_child_finished(Err(err));
            }
        }
        Ok(())
    }
}

/// Per-execution bookkeeping shared by the children's listeners.
struct Tracker {
    runnables: Vec<ActionRef>,
    abort_upon_failure: bool,
    remaining: AtomicUsize,
    aborted: AtomicBool,
    first_error: Mutex<Option<ActionError>>,
    completion: Mutex<Option<Completion>>,
}

impl Tracker {
    fn on_child_finished(&self, result: Result<(), ActionError>) {
        match result {
            Ok(()) => {}
            Err(ActionError::Aborted) => self.aborted.store(true, Ordering::SeqCst),
            Err(err) => {
                let first = {
                    let mut slot = self.first_error.lock();
                    if slot.is_none() {
                        *slot = Some(err);
                        true
                    } else {
                        false
                    }
                };
                if first && self.abort_upon_failure {
                    for runnable in &self.runnables {
                        if let Err(err) = runnable.abort() {
                            tracing::warn!(error = %err, "could not abort sibling");
                        }
                    }
                }
            }
        }

        if self.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.complete();
        }
    }

    fn complete(&self) {
        let Some(completion) = self.completion.lock().take() else {
            return;
        };
        let result = match self.first_error.lock().take() {
            Some(err) => Err(err),
            None if self.aborted.load(Ordering::SeqCst) => Err(ActionError::Aborted),
            None => Ok(()),
        };
        let done: Vec<Arc<Signal>> = self.runnables.iter().map(|r| r.done_signal()).collect();
        on_all_set(&done, move || completion.deliver(result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::actions::ActionFn;
    use crate::wrappers::Pause;

    #[derive(Debug, thiserror::Error)]
    #[error("sensor offline")]
    struct SensorOffline;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn test_runs_children_concurrently() {
        let parallel = Parallel::from_actions(
            false,
            (0..4).map(|_| Pause::new(Duration::from_millis(50)) as ActionRef),
        )
        .unwrap();

        let started = Instant::now();
        parallel.sync_execute().unwrap();
        assert!(started.elapsed() < Duration::from_millis(190));
        assert!(parallel.done_signal().is_signaled());
    }

    #[test]
    fn test_failure_aborts_siblings() {
        let pause = Pause::new(DAY);
        let parallel = Parallel::from_actions(
            true,
            [
                ActionFn::arc("fails", |_| {
                    thread::sleep(Duration::from_millis(10));
                    Err(ActionError::failed(SensorOffline))
                }) as ActionRef,
                pause.clone(),
            ],
        )
        .unwrap();

        let err = parallel.sync_execute().unwrap_err();
        assert!(err.downcast_ref::<SensorOffline>().is_some());
        assert!(pause.done_signal().is_signaled());
        assert_eq!(pause.depth(), 2);
    }

    #[test]
    fn test_failure_without_abort_waits_for_siblings() {
        let parallel = Parallel::from_actions(
            false,
            [
                ActionFn::arc("fails", |_| Err(ActionError::msg("boom"))) as ActionRef,
                Pause::new(Duration::from_millis(30)),
            ],
        )
        .unwrap();

        let started = Instant::now();
        let err = parallel.sync_execute().unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_abort_reports_aborted() {
        for abort_upon_failure in [false, true] {
            let parallel = Parallel::from_actions(
                abort_upon_failure,
                [Pause::new(DAY) as ActionRef, Pause::new(DAY)],
            )
            .unwrap();

            let slot = Arc::new(Mutex::new(None));
            let s = Arc::clone(&slot);
            parallel
                .async_execute(move |outcome: Outcome| *s.lock() = Some(outcome.as_label()))
                .unwrap();
            thread::sleep(Duration::from_millis(20));

            parallel.abort_and_wait().unwrap();
            assert_eq!(*slot.lock(), Some("aborted"));
        }
    }

    #[test]
    fn test_empty_parallel_succeeds() {
        let parallel = Parallel::new(true);
        parallel.sync_execute().unwrap();
        assert_eq!(
            parallel.extended_description(),
            "Number of actions: 0; Abort upon failure? true"
        );
    }

    #[test]
    fn test_clear_releases_linked_children() {
        let parallel = Parallel::new(true);
        let child: ActionRef = ActionFn::arc("child", |_| Ok(()));
        parallel.add(Arc::clone(&child)).unwrap();
        assert!(child.parent().is_some());

        parallel.clear().unwrap();
        assert!(child.parent().is_none());
        Parallel::new(false).add(child).unwrap();
    }
}
