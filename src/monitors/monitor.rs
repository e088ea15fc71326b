//! # Monitor trait and the process-wide registry.
//!
//! A [`Monitor`] observes executions: `on_starting` when an execution opens and
//! `on_finished` when it closes, for every action including nested ones, in the order
//! they happen. The process-wide registry feeds every action; a
//! [`Dispatcher`](crate::Dispatcher) additionally feeds its own monitors for the roots
//! it runs.
//!
//! ## Contract
//! - Callbacks run synchronously on the thread that opens/closes the execution, so
//!   they should be quick.
//! - Callbacks must not fail; a panic is caught and logged by [`MonitorSet`].
//! - Register monitors before executing anything; registration while actions run is
//!   allowed but monitors only see events raised after they were added.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::actions::Action;
use crate::error::ActionError;

use super::set::MonitorSet;

/// Observer of action executions.
pub trait Monitor: Send + Sync + 'static {
    /// An execution of `action` is starting.
    fn on_starting(&self, action: &dyn Action);

    /// An execution of `action` finished; `error` is `None` on success.
    fn on_finished(&self, action: &dyn Action, error: Option<&ActionError>);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

static GLOBAL: RwLock<Option<Arc<MonitorSet>>> = parking_lot::const_rwlock(None);

/// Adds a monitor that observes every action in the process.
pub fn register(monitor: Arc<dyn Monitor>) {
    let mut global = GLOBAL.write();
    let mut set = global.as_deref().cloned().unwrap_or_default();
    set.push(monitor);
    *global = Some(Arc::new(set));
}

/// Removes a monitor previously passed to [`register`]; returns `true` if it was found.
pub fn unregister(monitor: &Arc<dyn Monitor>) -> bool {
    let mut global = GLOBAL.write();
    let Some(current) = global.as_deref() else {
        return false;
    };

    let mut set = current.clone();
    let removed = set.remove(monitor);
    *global = if set.is_empty() {
        None
    } else {
        Some(Arc::new(set))
    };
    removed
}

/// Removes every process-wide monitor.
pub fn clear() {
    *GLOBAL.write() = None;
}

fn snapshot() -> Option<Arc<MonitorSet>> {
    GLOBAL.read().clone()
}

pub(crate) fn notify_starting(action: &dyn Action) {
    if let Some(set) = snapshot() {
        set.starting(action);
    }
}

pub(crate) fn notify_finished(action: &dyn Action, error: Option<&ActionError>) {
    if let Some(set) = snapshot() {
        set.finished(action, error);
    }
}

/// Word used by the log formats for a finished execution.
pub(crate) fn finish_word(error: Option<&ActionError>) -> &'static str {
    match error {
        None => "Completed",
        Some(ActionError::Aborted) => "Aborted",
        Some(_) => "Failed",
    }
}
