//! # Dispatcher: bounded admission of root actions.
//!
//! A [`Dispatcher`] runs at most `pool_size` root actions at a time, queueing the rest
//! in FIFO order.
//!
//! ## Flow
//! ```text
//! dispatch(root) ──► reset idle ──► running < pool_size ? ─ yes ─► starting ─► async_execute
//!                                                        └─ no ──► backlog.push_back
//!
//! listener(outcome) ──► finished ──► (root done set) ──► remove from running
//!                                                      ├─► backlog not empty ─► launch next
//!                                                      └─► nothing left ──────► set idle
//! ```
//!
//! ## Rules
//! - Only roots can be dispatched.
//! - A launch failure goes through the same path as a completion (monitors, running
//!   set, next queued action) and is also returned from `dispatch`.
//! - `abort` drains the backlog (each drained action is reported to the dispatcher's
//!   monitors as finished with `Aborted`) and aborts every running action.
//! - Idle is set only once every dispatched action's done signal is set.
//! - Dropping the dispatcher blocks until it is idle.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::actions::{ActionExt, ActionRef, Outcome};
use crate::error::{ActionError, UsageError};
use crate::monitors::MonitorSet;
use crate::signals::Signal;

use super::builder::DispatcherBuilder;
use super::config::DispatcherConfig;

struct State {
    running: Vec<ActionRef>,
    backlog: VecDeque<ActionRef>,
}

struct Inner {
    pool_size: usize,
    monitors: MonitorSet,
    state: Mutex<State>,
    idle: Arc<Signal>,
}

/// Bounded-concurrency runner for root actions.
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Creates a dispatcher without dispatcher-level monitors.
    pub fn new(cfg: DispatcherConfig) -> Result<Self, UsageError> {
        Self::builder(cfg).build()
    }

    /// Starts building a dispatcher.
    pub fn builder(cfg: DispatcherConfig) -> DispatcherBuilder {
        DispatcherBuilder::new(cfg)
    }

    pub(super) fn new_internal(pool_size: usize, monitors: MonitorSet) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool_size,
                monitors,
                state: Mutex::new(State {
                    running: Vec::new(),
                    backlog: VecDeque::new(),
                }),
                idle: Signal::new_signaled(),
            }),
        }
    }

    /// Runs `action` now if a slot is free, otherwise queues it.
    pub fn dispatch(&self, action: ActionRef) -> Result<(), ActionError> {
        if action.core().has_owner() {
            return Err(UsageError::NotDispatchable {
                action: action.description(),
            }
            .into());
        }

        let launch = {
            let mut state = self.inner.state.lock();
            self.inner.idle.reset();
            if state.running.len() < self.inner.pool_size {
                state.running.push(Arc::clone(&action));
                true
            } else {
                state.backlog.push_back(Arc::clone(&action));
                false
            }
        };

        if launch {
            Inner::launch(&self.inner, action)
        } else {
            tracing::debug!(action = %action.description(), "queued");
            Ok(())
        }
    }

    /// Drops queued actions and aborts running ones. Returns immediately.
    pub fn abort(&self) {
        let (drained, running) = {
            let mut state = self.inner.state.lock();
            let drained: Vec<ActionRef> = state.backlog.drain(..).collect();
            (drained, state.running.clone())
        };

        for action in &drained {
            self.inner
                .monitors
                .finished(&**action, Some(&ActionError::Aborted));
        }
        for action in &running {
            if let Err(err) = action.abort() {
                tracing::warn!(action = %action.description(), error = %err, "abort failed");
            }
        }
        self.inner.signal_idle_if_quiet();
    }

    /// Blocks until nothing runs and nothing is queued.
    pub fn wait(&self) {
        self.inner.idle.wait();
    }

    /// Like [`wait`](Self::wait) with a timeout; returns `true` if idle.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.inner.idle.wait_timeout(timeout)
    }

    /// [`abort`](Self::abort) followed by [`wait`](Self::wait).
    pub fn abort_and_wait(&self) {
        self.abort();
        self.wait();
    }

    /// Number of running actions.
    pub fn running(&self) -> usize {
        self.inner.state.lock().running.len()
    }

    /// Number of queued actions.
    pub fn queued(&self) -> usize {
        self.inner.state.lock().backlog.len()
    }

    /// Maximum number of concurrently running actions.
    pub fn pool_size(&self) -> usize {
        self.inner.pool_size
    }

    /// Set while nothing runs and nothing is queued.
    pub fn idle_signal(&self) -> Arc<Signal> {
        Arc::clone(&self.inner.idle)
    }
}

impl Inner {
    fn launch(this: &Arc<Self>, action: ActionRef) -> Result<(), ActionError> {
        this.monitors.starting(&*action);

        let (inner, finished) = (Arc::clone(this), Arc::clone(&action));
        let launched = action.async_execute(move |outcome: Outcome| {
            Inner::on_finished(&inner, finished, outcome.into_result());
        });

        if let Err(err) = &launched {
            tracing::warn!(action = %action.description(), error = %err, "launch failed");
            Inner::on_finished(this, action, Err(err.clone()));
        }
        launched
    }

    fn on_finished(this: &Arc<Self>, action: ActionRef, result: Result<(), ActionError>) {
        this.monitors.finished(&*action, result.as_ref().err());

        let inner = Arc::clone(this);
        let done = action.done_signal();
        done.when_set(move || Inner::release_slot(&inner, &action));
    }

    fn release_slot(this: &Arc<Self>, action: &ActionRef) {
        let next = {
            let mut state = this.state.lock();
            state.running.retain(|r| r.id() != action.id());
            let next = state.backlog.pop_front();
            if let Some(next) = &next {
                state.running.push(Arc::clone(next));
            } else if state.running.is_empty() {
                this.idle.set();
            }
            next
        };

        if let Some(next) = next {
            // failures are already routed through on_finished
            let _ = Inner::launch(this, next);
        }
    }

    fn signal_idle_if_quiet(&self) {
        let state = self.state.lock();
        if state.running.is_empty() && state.backlog.is_empty() {
            self.idle.set();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.wait();
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Dispatcher")
            .field("pool_size", &self.inner.pool_size)
            .field("running", &state.running.len())
            .field("queued", &state.backlog.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use crate::actions::{Action, ActionFn};
    use crate::monitors::Monitor;
    use crate::wrappers::Pause;

    #[derive(Default)]
    struct Counts {
        started: AtomicUsize,
        finished: AtomicUsize,
        aborted: AtomicUsize,
    }

    impl Monitor for Counts {
        fn on_starting(&self, _action: &dyn Action) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_finished(&self, _action: &dyn Action, error: Option<&ActionError>) {
            self.finished.fetch_add(1, Ordering::SeqCst);
            if error.is_some_and(|e| e.is_aborted()) {
                self.aborted.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn dispatcher(pool_size: usize, counts: &Arc<Counts>) -> Dispatcher {
        Dispatcher::builder(DispatcherConfig::with_pool_size(pool_size))
            .with_monitors(vec![counts.clone()])
            .build()
            .unwrap()
    }

    #[test]
    fn test_pool_bounds_concurrency_and_abort_reports_everything() {
        let counts = Arc::new(Counts::default());
        let d = dispatcher(2, &counts);

        for _ in 0..5 {
            d.dispatch(Pause::new(Duration::from_secs(3600))).unwrap();
        }
        assert_eq!(d.running(), 2);
        assert_eq!(d.queued(), 3);
        assert!(!d.idle_signal().is_signaled());

        d.abort_and_wait();
        assert!(d.idle_signal().is_signaled());
        assert_eq!(counts.started.load(Ordering::SeqCst), 2);
        assert_eq!(counts.finished.load(Ordering::SeqCst), 5);
        assert_eq!(counts.aborted.load(Ordering::SeqCst), 5);
        assert_eq!(d.running() + d.queued(), 0);
    }

    #[test]
    fn test_queued_actions_run_in_order() {
        let counts = Arc::new(Counts::default());
        let d = dispatcher(1, &counts);
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for n in 0..4 {
            let o = Arc::clone(&order);
            d.dispatch(ActionFn::arc("step", move |_| {
                thread::sleep(Duration::from_millis(5));
                o.lock().push(n);
                Ok(())
            }))
            .unwrap();
        }
        d.wait();

        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
        assert_eq!(counts.finished.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_rejects_owned_actions_and_zero_pool() {
        let d = Dispatcher::new(DispatcherConfig::with_pool_size(1)).unwrap();
        let owner = ActionFn::arc("owner", |_| Ok(()));
        let child: ActionRef = ActionFn::arc("child", |_| Ok(()));
        owner.take_ownership(Arc::clone(&child)).unwrap();

        let err = d.dispatch(child).unwrap_err();
        assert!(matches!(err.as_usage(), Some(UsageError::NotDispatchable { .. })));
        assert!(d.idle_signal().is_signaled());

        assert!(matches!(
            Dispatcher::new(DispatcherConfig::with_pool_size(0)).unwrap_err(),
            UsageError::ZeroPoolSize
        ));
    }

    #[test]
    fn test_idle_follows_done_signals() {
        let counts = Arc::new(Counts::default());
        let d = dispatcher(3, &counts);
        let actions: Vec<ActionRef> = (0..3)
            .map(|_| Pause::new(Duration::from_millis(10)) as ActionRef)
            .collect();
        for action in &actions {
            d.dispatch(Arc::clone(action)).unwrap();
        }

        d.wait();
        assert!(actions.iter().all(|a| a.done_signal().is_signaled()));
    }
}
