//! # Line-oriented execution log for debugging and demos.
//!
//! [`LogWriter`] writes one line per start and per finish to any `Write` sink
//! (stdout, an append-mode file, a buffer in tests).
//!
//! ## Output format
//! ```text
//! 2026-03-01T10:15:42Z 7(0) Starting Sequence [Number of actions: 2]
//! 2026-03-01T10:15:42Z  8(7) Starting fetch
//! 2026-03-01T10:15:43Z  8(7) Failed fetch Reason: connection refused
//! 2026-03-01T10:15:43Z 7(0) Failed Sequence Reason: connection refused [Number of actions: 2]
//! ```
//! Each line is `timestamp`, one space per level of depth, `id(parentId)`, the event
//! word, the action name, then the failure reason and the bracketed extended
//! description when present. Ids of actions without a parent print `0` as parent.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::actions::{Action, ActionExt};
use crate::error::ActionError;

use super::monitor::{Monitor, finish_word};
use super::trace::parent_id;

/// Monitor writing human-readable lines to a sink.
///
/// Enabled via the `logging` feature. Writes are serialized; an I/O error is logged
/// through `tracing` and the line is dropped.
pub struct LogWriter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl LogWriter {
    /// Writes to an arbitrary sink.
    pub fn new<W: Write + Send + 'static>(out: W) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    /// Writes to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Appends to `path`, creating the file if needed.
    pub fn append_to(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }

    /// Renders one log line (without the trailing newline).
    pub fn format_line(
        at: DateTime<Utc>,
        action: &dyn Action,
        event: &str,
        reason: Option<&ActionError>,
    ) -> String {
        let mut line = format!(
            "{} {}{}({}) {} {}",
            at.format("%Y-%m-%dT%H:%M:%SZ"),
            " ".repeat(action.depth()),
            action.id(),
            parent_id(action),
            event,
            action.name(),
        );
        if let Some(reason) = reason {
            line.push_str(&format!(" Reason: {reason}"));
        }
        let extended = action.extended_description();
        if !extended.is_empty() {
            line.push_str(&format!(" [{extended}]"));
        }
        line
    }

    fn write(&self, action: &dyn Action, event: &str, reason: Option<&ActionError>) {
        let line = Self::format_line(Utc::now(), action, event, reason);
        let mut out = self.out.lock();
        if let Err(err) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            tracing::warn!(error = %err, "log writer failed");
        }
    }
}

impl Monitor for LogWriter {
    fn on_starting(&self, action: &dyn Action) {
        self.write(action, "Starting", None);
    }

    fn on_finished(&self, action: &dyn Action, error: Option<&ActionError>) {
        let reason = error.filter(|e| !e.is_aborted());
        self.write(action, finish_word(error), reason);
    }
}
