//! # Retry decision contract.
//!
//! A [`RetryPolicy`] is asked after every failed attempt of a
//! [`Retry`](crate::wrappers::Retry) whether to try again and after how long.
//! Aborts are never offered to the policy.
//!
//! Closures are policies:
//! ```rust
//! use std::time::Duration;
//! use actionvisor::{ActionError, RetryPolicy};
//!
//! let three_quick_tries = |failures: u32, _err: &ActionError| {
//!     (failures < 3).then_some(Duration::from_millis(10))
//! };
//! assert!(three_quick_tries.on_failure(2, &ActionError::msg("x")).is_some());
//! ```

use std::time::Duration;

use crate::error::ActionError;

/// Decides whether a failed attempt is retried.
pub trait RetryPolicy: Send + Sync + 'static {
    /// Called after failure number `failures` (starting at 1).
    ///
    /// Returns the pause before the next attempt, or `None` to give up and report
    /// `error`.
    fn on_failure(&self, failures: u32, error: &ActionError) -> Option<Duration>;
}

impl<F> RetryPolicy for F
where
    F: Fn(u32, &ActionError) -> Option<Duration> + Send + Sync + 'static,
{
    fn on_failure(&self, failures: u32, error: &ActionError) -> Option<Duration> {
        self(failures, error)
    }
}
