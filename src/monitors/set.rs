//! # MonitorSet: synchronous fan-out over several monitors.
//!
//! ## What it guarantees
//! - Monitors are called in registration order.
//! - A panic inside one monitor is caught and logged; the remaining monitors still run.
//!
//! ## Diagram
//! ```text
//!    starting(&action) / finished(&action, err)
//!        │
//!        ├──► M1 (catch_unwind)
//!        ├──► M2 (catch_unwind)
//!        └──► MN (catch_unwind)
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::actions::Action;
use crate::error::{ActionError, Panicked};

use super::monitor::Monitor;

/// Ordered collection of monitors.
#[derive(Clone, Default)]
pub struct MonitorSet {
    monitors: Vec<Arc<dyn Monitor>>,
}

impl MonitorSet {
    /// Creates a set from monitors, keeping their order.
    #[must_use]
    pub fn new(monitors: Vec<Arc<dyn Monitor>>) -> Self {
        Self { monitors }
    }

    /// Appends a monitor.
    pub fn push(&mut self, monitor: Arc<dyn Monitor>) {
        self.monitors.push(monitor);
    }

    /// Removes a monitor by identity; returns `true` if it was present.
    pub fn remove(&mut self, monitor: &Arc<dyn Monitor>) -> bool {
        let before = self.monitors.len();
        self.monitors.retain(|m| !Arc::ptr_eq(m, monitor));
        self.monitors.len() != before
    }

    /// Fans out `on_starting`.
    pub fn starting(&self, action: &dyn Action) {
        for monitor in &self.monitors {
            guarded(monitor.as_ref(), || monitor.on_starting(action));
        }
    }

    /// Fans out `on_finished`.
    pub fn finished(&self, action: &dyn Action, error: Option<&ActionError>) {
        for monitor in &self.monitors {
            guarded(monitor.as_ref(), || monitor.on_finished(action, error));
        }
    }

    /// True if there are no monitors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Number of monitors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.monitors.len()
    }
}

fn guarded(monitor: &dyn Monitor, call: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(call)) {
        let panicked = Panicked::from_payload(payload.as_ref());
        tracing::error!(monitor = monitor.name(), error = %panicked, "monitor panicked");
    }
}

impl fmt::Debug for MonitorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.monitors.iter().map(|m| m.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionFn;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Monitor for Recorder {
        fn on_starting(&self, action: &dyn Action) {
            self.0.lock().push(format!("start {}", action.name()));
        }

        fn on_finished(&self, action: &dyn Action, error: Option<&ActionError>) {
            self.0
                .lock()
                .push(format!("finish {} {}", action.name(), error.is_some()));
        }
    }

    struct Faulty;

    impl Monitor for Faulty {
        fn on_starting(&self, _action: &dyn Action) {
            panic!("faulty monitor");
        }

        fn on_finished(&self, _action: &dyn Action, _error: Option<&ActionError>) {}
    }

    #[test]
    fn test_panicking_monitor_does_not_stop_fan_out() {
        let recorder = Arc::new(Recorder::default());
        let set = MonitorSet::new(vec![Arc::new(Faulty), recorder.clone()]);
        let action = ActionFn::arc("heartbeat", |_| Ok(()));

        set.starting(&*action);
        set.finished(&*action, Some(&ActionError::Aborted));

        assert_eq!(
            *recorder.0.lock(),
            vec!["start heartbeat".to_string(), "finish heartbeat true".to_string()]
        );
    }

    #[test]
    fn test_remove_by_identity() {
        let a: Arc<dyn Monitor> = Arc::new(Recorder::default());
        let b: Arc<dyn Monitor> = Arc::new(Recorder::default());
        let mut set = MonitorSet::new(vec![a.clone(), b.clone()]);

        assert!(set.remove(&a));
        assert!(!set.remove(&a));
        assert_eq!(set.len(), 1);
    }
}
