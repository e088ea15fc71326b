//! Retry policies.
//!
//! This module groups the knobs that control **whether** a failed action is retried
//! and **how long** to wait before the next attempt.
//!
//! ## Contents
//! - [`RetryPolicy`] retry-or-give-up decision, implemented by closures too
//! - [`BackoffPolicy`] how delays evolve (first / factor / max + jitter)
//! - [`BackoffRetry`] backoff curve with a retry budget
//! - [`JitterPolicy`] randomization strategy to avoid thundering herd
//!
//! ## Quick wiring
//! ```text
//! Retry::new(action, BackoffPolicy { .. }.retry_up_to(5))
//!      └─► on failure n: policy.on_failure(n, &err)
//!           - Some(delay) ─► pause(delay) ─► run again
//!           - None        ─► report err
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` first=100ms, factor=1.0 (constant), max=30s, jitter=None.
//! - `JitterPolicy::None` by default; consider `Equal` for balanced randomness.

mod backoff;
mod jitter;
mod retry;

pub use backoff::{BackoffPolicy, BackoffRetry};
pub use jitter::JitterPolicy;
pub use retry::RetryPolicy;
