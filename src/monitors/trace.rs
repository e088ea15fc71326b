//! # Monitor that forwards executions to `tracing`.
//!
//! Starts are emitted at `DEBUG`, successful and aborted completions at `INFO`,
//! failures at `WARN`. Every event carries `id`, `parent`, `depth` and `action`.

use crate::actions::{Action, ActionExt};
use crate::error::ActionError;

use super::monitor::Monitor;

/// Emits one `tracing` event per start and per finish.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceMonitor;

impl Monitor for TraceMonitor {
    fn on_starting(&self, action: &dyn Action) {
        tracing::debug!(
            id = action.id(),
            parent = parent_id(action),
            depth = action.depth(),
            action = action.name(),
            "starting"
        );
    }

    fn on_finished(&self, action: &dyn Action, error: Option<&ActionError>) {
        let (id, parent, depth, name) = (action.id(), parent_id(action), action.depth(), action.name());
        match error {
            None => tracing::info!(id, parent, depth, action = name, "completed"),
            Some(ActionError::Aborted) => tracing::info!(id, parent, depth, action = name, "aborted"),
            Some(err) => tracing::warn!(
                id,
                parent,
                depth,
                action = name,
                kind = err.as_label(),
                error = %err,
                "failed"
            ),
        }
    }
}

pub(crate) fn parent_id(action: &dyn Action) -> u64 {
    action.parent().map_or(0, |p| p.id())
}
