//! # Sync/async bridge adapters.
//!
//! Most actions are easiest to write in one style only. The two generic nodes here
//! supply the other form:
//!
//! - [`SyncAction<B>`] wraps a blocking [`SyncBody`]. Its callback form runs the body
//!   on a dedicated worker thread and finishes the completion from there. Launches are
//!   serialized: the previous worker is joined before the next one starts.
//! - [`AsyncAction<B>`] wraps a callback-driven [`AsyncBody`]. Its blocking form starts
//!   the body with an internal completion and parks on a private signal until it fires.
//!
//! ```text
//! SyncAction::execute_callback ─► join previous worker ─► spawn worker
//!                                                         └─► check abort ─► body.run ─► completion.finish
//! AsyncAction::execute_blocking ─► body.start(internal completion) ─► wait private signal ─► result
//! ```
//!
//! Both nodes dereference to their body, so body-specific methods (`Pause::cut_short`,
//! ...) are reachable directly on the `Arc` returned by the factory.

use std::fmt;
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::error::{ActionError, Panicked, UsageError};
use crate::signals::Signal;

use super::action::{Action, ActionExt, ActionRef};
use super::context::Context;
use super::core::{ActionCore, bind};
use super::listener::{Completion, Outcome};

/// Work that runs to completion on the calling thread.
pub trait SyncBody: Send + Sync + 'static {
    /// Type-level name used in descriptions.
    fn name(&self) -> &str;

    /// Free-text state for descriptions.
    fn describe(&self) -> String {
        String::new()
    }

    /// See [`Action::must_be_root`].
    fn must_be_root(&self) -> bool {
        false
    }

    /// See [`Action::linked_parent`].
    fn linked_parent(&self) -> Option<ActionRef> {
        None
    }

    /// Called before every run, on the thread that starts the execution.
    ///
    /// On the callback path this happens before the worker is spawned, so state set
    /// right after `async_execute` returns is not reset by it.
    fn prepare(&self) {}

    /// Does the work.
    fn run(&self, cx: &Context<'_>) -> Result<(), ActionError>;
}

/// Work that reports its result through a [`Completion`].
pub trait AsyncBody: Send + Sync + 'static {
    /// Type-level name used in descriptions.
    fn name(&self) -> &str;

    /// Free-text state for descriptions.
    fn describe(&self) -> String {
        String::new()
    }

    /// Starts the work and returns without waiting for it.
    ///
    /// `completion` must be finished from another thread. An error returned by
    /// [`Completion::finish`] on this thread should be propagated; if it is
    /// swallowed, the execution is closed as failed with
    /// [`UsageError::CompletionDropped`].
    fn start(&self, cx: &Context<'_>, completion: Completion) -> Result<(), ActionError>;

    /// Called when the action's tree is aborted.
    fn on_abort(&self, cx: &Context<'_>) {
        let _ = cx;
    }
}

/// Natively synchronous action around a [`SyncBody`].
pub struct SyncAction<B> {
    core: ActionCore,
    body: B,
    worker: Mutex<Option<JoinHandle<()>>>,
    prepared: Arc<AtomicBool>,
}

impl<B: SyncBody> SyncAction<B> {
    /// Creates the action and returns its shared handle.
    pub fn new(body: B) -> Arc<Self> {
        bind(Self {
            core: ActionCore::new(),
            body,
            worker: Mutex::new(None),
            prepared: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl<B> SyncAction<B> {
    /// The wrapped body.
    pub fn body(&self) -> &B {
        &self.body
    }
}

impl<B> Deref for SyncAction<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.body
    }
}

impl<B: SyncBody> Action for SyncAction<B> {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn name(&self) -> &str {
        self.body.name()
    }

    fn extended_description(&self) -> String {
        self.body.describe()
    }

    fn is_naturally_synchronous(&self) -> bool {
        true
    }

    fn must_be_root(&self) -> bool {
        self.body.must_be_root()
    }

    fn linked_parent(&self) -> Option<ActionRef> {
        self.body.linked_parent()
    }

    fn execute_blocking(&self) -> Result<(), ActionError> {
        // already prepared by execute_callback
        if !self.prepared.swap(false, Ordering::SeqCst) {
            self.body.prepare();
        }
        self.body.run(&Context::new(self))
    }

    fn execute_callback(&self, completion: Completion) -> Result<(), ActionError> {
        let this = self.core.this().ok_or_else(|| UsageError::Unbound {
            action: self.body.name().to_string(),
        })?;

        let mut worker = self.worker.lock();
        if let Some(previous) = worker.take() {
            join_unless_current(previous);
        }

        self.body.prepare();
        self.prepared.store(true, Ordering::SeqCst);
        let prepared = Arc::clone(&self.prepared);

        let spawned = thread::Builder::new()
            .name(format!("actionvisor-{}", self.core.id()))
            .spawn(move || {
                let result = match this.check_abort() {
                    Ok(()) => panic::catch_unwind(AssertUnwindSafe(|| this.execute_blocking()))
                        .unwrap_or_else(|payload| {
                            Err(ActionError::failed(Panicked::from_payload(payload.as_ref())))
                        }),
                    Err(err) => {
                        prepared.store(false, Ordering::SeqCst);
                        Err(err)
                    }
                };
                if let Err(err) = completion.finish(result) {
                    tracing::error!(error = %err, "worker could not report completion");
                }
            });

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.prepared.store(false, Ordering::SeqCst);
                tracing::error!(error = %err, action = self.body.name(), "failed to spawn worker");
                Err(ActionError::failed(err))
            }
        }
    }
}

impl<B> Drop for SyncAction<B> {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.get_mut().take() {
            join_unless_current(handle);
        }
    }
}

impl<B> fmt::Debug for SyncAction<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncAction").field("core", &self.core).finish()
    }
}

fn join_unless_current(handle: JoinHandle<()>) {
    if handle.thread().id() != thread::current().id() {
        let _ = handle.join();
    }
}

/// Natively asynchronous action around an [`AsyncBody`].
pub struct AsyncAction<B> {
    core: ActionCore,
    body: B,
}

impl<B: AsyncBody> AsyncAction<B> {
    /// Creates the action and returns its shared handle.
    pub fn new(body: B) -> Arc<Self> {
        bind(Self {
            core: ActionCore::new(),
            body,
        })
    }
}

impl<B> AsyncAction<B> {
    /// The wrapped body.
    pub fn body(&self) -> &B {
        &self.body
    }
}

impl<B> Deref for AsyncAction<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.body
    }
}

impl<B: AsyncBody> Action for AsyncAction<B> {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn name(&self) -> &str {
        self.body.name()
    }

    fn extended_description(&self) -> String {
        self.body.describe()
    }

    fn is_naturally_synchronous(&self) -> bool {
        false
    }

    fn on_abort(&self) {
        self.body.on_abort(&Context::new(self));
    }

    fn execute_blocking(&self) -> Result<(), ActionError> {
        block_on_callback(self)
    }

    fn execute_callback(&self, completion: Completion) -> Result<(), ActionError> {
        self.body.start(&Context::new(self), completion)
    }
}

impl<B> fmt::Debug for AsyncAction<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncAction").field("core", &self.core).finish()
    }
}

/// Runs the callback form of `action` and blocks until it reports.
pub(crate) fn block_on_callback<A: Action + ?Sized>(action: &A) -> Result<(), ActionError> {
    let done = Signal::new();
    let slot: Arc<Mutex<Option<Outcome>>> = Arc::new(Mutex::new(None));

    let (signal, result) = (Arc::clone(&done), Arc::clone(&slot));
    action.execute_callback(Completion::direct(Box::new(move |outcome: Outcome| {
        *result.lock() = Some(outcome);
        signal.set();
    })))?;

    done.wait();
    let outcome = slot.lock().take();
    outcome.map_or(Ok(()), Outcome::into_result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionFn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::ThreadId;
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("valve stuck")]
    struct ValveStuck;

    /// Finishes from a helper thread after a short delay.
    struct Delayed {
        result: fn() -> Result<(), ActionError>,
    }

    impl AsyncBody for Delayed {
        fn name(&self) -> &str {
            "Delayed"
        }

        fn start(&self, _cx: &Context<'_>, completion: Completion) -> Result<(), ActionError> {
            let result = self.result;
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                let _ = completion.finish(result());
            });
            Ok(())
        }
    }

    /// Panics while starting.
    struct Explodes;

    impl AsyncBody for Explodes {
        fn name(&self) -> &str {
            "Explodes"
        }

        fn start(&self, _cx: &Context<'_>, _completion: Completion) -> Result<(), ActionError> {
            panic!("boom");
        }
    }

    /// Hands the completion to a helper thread that loses it.
    struct Forgetful;

    impl AsyncBody for Forgetful {
        fn name(&self) -> &str {
            "Forgetful"
        }

        fn start(&self, _cx: &Context<'_>, completion: Completion) -> Result<(), ActionError> {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                drop(completion);
            });
            Ok(())
        }
    }

    /// Finishes on the calling thread and ignores the rejection.
    struct Careless;

    impl AsyncBody for Careless {
        fn name(&self) -> &str {
            "Careless"
        }

        fn start(&self, _cx: &Context<'_>, completion: Completion) -> Result<(), ActionError> {
            if let Err(err) = completion.succeed() {
                tracing::warn!(error = %err, "ignored");
            }
            Ok(())
        }
    }

    fn launch_recording<A: Action + ?Sized>(
        action: &A,
    ) -> (Result<(), ActionError>, Arc<Mutex<Vec<Outcome>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let launched = action.async_execute(move |outcome: Outcome| s.lock().push(outcome));
        (launched, seen)
    }

    /// Breaks the contract by finishing on the calling thread.
    struct Impatient;

    impl AsyncBody for Impatient {
        fn name(&self) -> &str {
            "Impatient"
        }

        fn start(&self, _cx: &Context<'_>, completion: Completion) -> Result<(), ActionError> {
            completion.succeed()?;
            Ok(())
        }
    }

    #[test]
    fn test_sync_action_runs_twice() {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        let action = ActionFn::arc("count", move |_| {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        action.sync_execute().unwrap();
        assert!(action.done_signal().is_signaled());
        action.sync_execute().unwrap();
        assert!(action.done_signal().is_signaled());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_sync_action_callback_runs_on_worker_thread() {
        let caller = thread::current().id();
        let seen: Arc<Mutex<Option<(ThreadId, &'static str)>>> = Arc::new(Mutex::new(None));

        let action = ActionFn::arc("noop", |_| Ok(()));
        for _ in 0..3 {
            let s = Arc::clone(&seen);
            action
                .async_execute(move |outcome: Outcome| {
                    *s.lock() = Some((thread::current().id(), outcome.as_label()));
                })
                .unwrap();
            action.wait();

            let (thread_id, label) = seen.lock().take().unwrap();
            assert_ne!(thread_id, caller);
            assert_eq!(label, "succeeded");
        }
    }

    #[test]
    fn test_sync_action_callback_honours_prior_abort() {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        let owner = ActionFn::arc("owner", |_| Ok(()));
        let child = ActionFn::arc("child", move |_| {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        owner.take_ownership(child.clone()).unwrap();
        owner.abort().unwrap();

        let outcome = Arc::new(Mutex::new(None));
        let o = Arc::clone(&outcome);
        child
            .async_execute(move |out: Outcome| *o.lock() = Some(out.as_label()))
            .unwrap();
        child.wait();

        assert_eq!(*outcome.lock(), Some("aborted"));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_async_action_blocking_form_keeps_error_type() {
        let action = AsyncAction::new(Delayed {
            result: || Err(ActionError::failed(ValveStuck)),
        });

        let err = action.sync_execute().unwrap_err();
        assert!(err.downcast_ref::<ValveStuck>().is_some());
        assert!(action.done_signal().is_signaled());

        let ok = AsyncAction::new(Delayed { result: || Ok(()) });
        ok.sync_execute().unwrap();
        ok.sync_execute().unwrap();
    }

    #[test]
    fn test_same_thread_completion_is_rejected() {
        let action = AsyncAction::new(Impatient);
        let called = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&called);

        let err = action
            .async_execute(move |_: Outcome| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap_err();

        assert!(matches!(
            err.as_usage(),
            Some(UsageError::SameThreadCallback { .. })
        ));
        assert_eq!(called.load(Ordering::SeqCst), 0);
        assert!(action.done_signal().is_signaled());
        assert!(!action.core().is_executing());
    }

    #[test]
    fn test_panicking_body_fails_the_callback_form() {
        let action = ActionFn::arc("explode", |_| -> Result<(), ActionError> {
            panic!("kaboom");
        });

        let outcome = Arc::new(Mutex::new(None));
        let o = Arc::clone(&outcome);
        action
            .async_execute(move |out: Outcome| *o.lock() = Some(out))
            .unwrap();
        action.wait();

        let outcome = outcome.lock().take().unwrap();
        let err = outcome.error().unwrap();
        assert_eq!(err.downcast_ref::<Panicked>().unwrap().message, "kaboom");
    }

    #[test]
    fn test_panic_while_starting_closes_the_execution() {
        let action = AsyncAction::new(Explodes);

        for _ in 0..2 {
            let (launched, seen) = launch_recording(&*action);
            let err = launched.unwrap_err();
            assert_eq!(err.downcast_ref::<Panicked>().unwrap().message, "boom");
            assert!(action.wait_timeout(Duration::from_secs(5)));
            assert!(!action.core().is_executing());
            assert!(seen.lock().is_empty());
        }
    }

    #[test]
    fn test_dropped_completion_fails_the_execution() {
        let action = AsyncAction::new(Forgetful);
        let (launched, seen) = launch_recording(&*action);
        launched.unwrap();

        assert!(action.wait_timeout(Duration::from_secs(5)));
        let outcomes = seen.lock();
        assert_eq!(outcomes.len(), 1);
        let err = outcomes[0].error().unwrap();
        assert!(matches!(err.as_usage(), Some(UsageError::CompletionDropped)));
    }

    #[test]
    fn test_swallowed_same_thread_rejection_still_closes() {
        let action = AsyncAction::new(Careless);
        let (launched, seen) = launch_recording(&*action);
        launched.unwrap();

        assert!(action.done_signal().is_signaled());
        assert!(!action.core().is_executing());
        let outcomes = seen.lock();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].as_label(), "failed");
    }
}

