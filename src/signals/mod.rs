//! Synchronization primitives.
//!
//! ## Contents
//! - [`Signal`] boolean latch with blocking waits, listeners and one-shot hooks
//! - [`WaitGroup`] any/all waits over several signals
//! - [`on_all_set`] run a closure once a set of signals has been set

mod group;
mod signal;

pub use group::WaitGroup;
pub use signal::{Signal, SignalListener, on_all_set};
