//! # WaitGroup: block on several signals at once.
//!
//! A [`WaitGroup`] subscribes to each registered [`Signal`] and records every
//! transition to signaled in a per-member flag guarded by the group's own lock.
//!
//! ## Rules
//! - A wait snapshots the members' current state on entry, then blocks on the group's
//!   condition variable until a member transition is recorded.
//! - `wait_for_any*` returns the lowest registration index that is signaled (or was
//!   signaled since the wait began).
//! - `wait_for_all*` returns once every member has been observed signaled at some
//!   point since the wait began. Members do not need to be set at the same time: a
//!   signal that is set and then reset during the wait still counts.
//! - A group is waited on by one thread at a time.
//!
//! ```text
//! Signal::set ─► Member::on_signaled ─► fired[i] = true ─► notify ─► waiter rechecks
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::signal::{Signal, SignalListener};

struct Shared {
    fired: Mutex<Vec<bool>>,
    changed: Condvar,
}

struct Member {
    index: usize,
    shared: Arc<Shared>,
}

impl SignalListener for Member {
    fn on_signaled(&self) {
        let mut fired = self.shared.fired.lock();
        if let Some(slot) = fired.get_mut(self.index) {
            *slot = true;
        }
        self.shared.changed.notify_all();
    }
}

/// Aggregates signals for any/all waits.
pub struct WaitGroup {
    shared: Arc<Shared>,
    signals: Vec<Arc<Signal>>,
    members: Vec<Arc<Member>>,
}

impl WaitGroup {
    /// Creates an empty group.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                fired: Mutex::new(Vec::new()),
                changed: Condvar::new(),
            }),
            signals: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Creates a group over `signals`, in order.
    pub fn from_signals<I>(signals: I) -> Self
    where
        I: IntoIterator<Item = Arc<Signal>>,
    {
        let mut group = Self::new();
        for signal in signals {
            group.add(signal);
        }
        group
    }

    /// Registers a signal and returns its index.
    pub fn add(&mut self, signal: Arc<Signal>) -> usize {
        let index = self.signals.len();
        let member = Arc::new(Member {
            index,
            shared: Arc::clone(&self.shared),
        });

        self.shared.fired.lock().push(false);
        let listener: Arc<dyn SignalListener> = member.clone();
        signal.subscribe(Arc::downgrade(&listener));

        self.members.push(member);
        self.signals.push(signal);
        index
    }

    /// Number of registered signals.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if no signal is registered.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Blocks until any member is signaled and returns its index.
    ///
    /// Returns `None` only for an empty group.
    pub fn wait_for_any(&self) -> Option<usize> {
        self.any_until(None)
    }

    /// Like [`wait_for_any`](Self::wait_for_any), giving up after `timeout`.
    pub fn wait_for_any_timeout(&self, timeout: Duration) -> Option<usize> {
        self.any_until(Instant::now().checked_add(timeout))
    }

    /// Blocks until every member has been observed signaled.
    pub fn wait_for_all(&self) {
        self.all_until(None);
    }

    /// Like [`wait_for_all`](Self::wait_for_all), giving up after `timeout`.
    ///
    /// Returns `true` if every member was observed signaled.
    pub fn wait_for_all_timeout(&self, timeout: Duration) -> bool {
        self.all_until(Instant::now().checked_add(timeout))
    }

    fn any_until(&self, deadline: Option<Instant>) -> Option<usize> {
        if self.signals.is_empty() {
            return None;
        }

        let mut fired = self.shared.fired.lock();
        fired.iter_mut().for_each(|f| *f = false);

        loop {
            let hit = (0..self.signals.len()).find(|&i| fired[i] || self.signals[i].is_signaled());
            if hit.is_some() {
                return hit;
            }
            match deadline {
                None => self.shared.changed.wait(&mut fired),
                Some(deadline) => {
                    if self.shared.changed.wait_until(&mut fired, deadline).timed_out() {
                        return fired.iter().position(|f| *f);
                    }
                }
            }
        }
    }

    fn all_until(&self, deadline: Option<Instant>) -> bool {
        let mut fired = self.shared.fired.lock();
        fired.iter_mut().for_each(|f| *f = false);
        let mut seen = vec![false; self.signals.len()];

        loop {
            for (i, observed) in seen.iter_mut().enumerate() {
                if fired[i] || self.signals[i].is_signaled() {
                    *observed = true;
                }
            }
            if seen.iter().all(|s| *s) {
                return true;
            }
            match deadline {
                None => self.shared.changed.wait(&mut fired),
                Some(deadline) => {
                    if self.shared.changed.wait_until(&mut fired, deadline).timed_out() {
                        return seen.iter().zip(fired.iter()).all(|(s, f)| *s || *f);
                    }
                }
            }
        }
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}
