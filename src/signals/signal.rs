//! # Signal: a level-triggered boolean latch.
//!
//! [`Signal`] is the synchronization primitive every other part of the crate is built
//! on: done signals, abort signals, the dispatcher's idle signal and the cut-short
//! signal of a pause are all `Arc<Signal>`s.
//!
//! ## Rules
//! - `set` and `reset` are idempotent.
//! - Listeners and hooks fire only on a false-to-true transition, after the internal
//!   lock has been released, on the thread that called `set`.
//! - Blocking waits park on a condition variable.
//!
//! ## Hooks vs listeners
//! ```text
//! subscribe(Weak<dyn SignalListener>) ──► fires on every transition while the listener lives
//! when_set(FnOnce)                     ──► fires once, on the next transition (or now if set)
//! ```

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Observer of false-to-true transitions of a [`Signal`].
pub trait SignalListener: Send + Sync {
    /// Called after the signal became set.
    fn on_signaled(&self);
}

type Hook = Box<dyn FnOnce() + Send + 'static>;

struct State {
    signaled: bool,
    hooks: Vec<Hook>,
}

/// Boolean latch with blocking waits and transition callbacks.
pub struct Signal {
    state: Mutex<State>,
    changed: Condvar,
    listeners: Mutex<Vec<Weak<dyn SignalListener>>>,
}

impl Signal {
    /// Creates an unsignaled signal.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_state(false))
    }

    /// Creates a signal that starts out set.
    pub fn new_signaled() -> Arc<Self> {
        Arc::new(Self::with_state(true))
    }

    fn with_state(signaled: bool) -> Self {
        Self {
            state: Mutex::new(State {
                signaled,
                hooks: Vec::new(),
            }),
            changed: Condvar::new(),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Sets the signal, waking every waiter.
    pub fn set(&self) {
        let hooks = {
            let mut state = self.state.lock();
            if state.signaled {
                return;
            }
            state.signaled = true;
            self.changed.notify_all();
            std::mem::take(&mut state.hooks)
        };

        let listeners: Vec<_> = self
            .listeners
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for listener in listeners {
            listener.on_signaled();
        }
        for hook in hooks {
            hook();
        }
    }

    /// Clears the signal.
    pub fn reset(&self) {
        self.state.lock().signaled = false;
    }

    /// Non-blocking check.
    pub fn is_signaled(&self) -> bool {
        self.state.lock().signaled
    }

    /// Blocks until the signal is set.
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while !state.signaled {
            self.changed.wait(&mut state);
        }
    }

    /// Blocks until the signal is set or `timeout` elapses.
    ///
    /// Returns `true` if the signal was set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };

        let mut state = self.state.lock();
        while !state.signaled {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return state.signaled;
            }
        }
        true
    }

    /// Registers a listener notified on every transition to signaled.
    ///
    /// The signal only keeps a weak reference; dead listeners are pruned on the
    /// next registration.
    pub fn subscribe(&self, listener: Weak<dyn SignalListener>) {
        let mut listeners = self.listeners.lock();
        listeners.retain(|l| l.strong_count() > 0);
        listeners.push(listener);
    }

    /// Runs `hook` once, on the next transition to signaled.
    ///
    /// If the signal is already set the hook runs immediately on the calling thread.
    pub fn when_set<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock();
        if state.signaled {
            drop(state);
            hook();
        } else {
            state.hooks.push(Box::new(hook));
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::with_state(false)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("signaled", &self.is_signaled())
            .finish()
    }
}

/// Runs `then` once every signal in `signals` has been set.
///
/// `then` runs on the thread that sets the last outstanding signal, or right away
/// on the calling thread when all of them are already set.
pub fn on_all_set<F>(signals: &[Arc<Signal>], then: F)
where
    F: FnOnce() + Send + 'static,
{
    if signals.is_empty() {
        then();
        return;
    }

    let pending = Arc::new(Mutex::new((signals.len(), Some(then))));
    for signal in signals {
        let pending = Arc::clone(&pending);
        signal.when_set(move || {
            let ready = {
                let mut guard = pending.lock();
                guard.0 -= 1;
                if guard.0 == 0 { guard.1.take() } else { None }
            };
            if let Some(then) = ready {
                then();
            }
        });
    }
}
