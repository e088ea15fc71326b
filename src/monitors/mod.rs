//! # Execution monitors.
//!
//! This module provides the [`Monitor`] trait, the process-wide registry every action
//! reports to, and built-in implementations.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   ActionCore::begin ─── starting(&action) ──┐
//!   ActionCore::finish ── finished(&action) ──┤
//!                                             ├──► global MonitorSet ──► Monitor...
//!                                             │
//!   Dispatcher (roots it runs) ───────────────┴──► dispatcher MonitorSet ──► Monitor...
//!                                                         │
//!                                                    ┌────┴────────┬─────────┐
//!                                                    ▼             ▼         ▼
//!                                                LogWriter   TraceMonitor  Custom
//! ```
//!
//! ## Implementing custom monitors
//! ```no_run
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use actionvisor::{Action, ActionError, Monitor};
//!
//! #[derive(Default)]
//! struct FailureCounter(AtomicUsize);
//!
//! impl Monitor for FailureCounter {
//!     fn on_starting(&self, _action: &dyn Action) {}
//!
//!     fn on_finished(&self, _action: &dyn Action, error: Option<&ActionError>) {
//!         if error.is_some_and(|e| !e.is_aborted()) {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod monitor;
mod set;
mod trace;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use monitor::{Monitor, clear, register, unregister};
pub use set::MonitorSet;
pub use trace::TraceMonitor;

pub(crate) use monitor::{notify_finished, notify_starting};
