//! # Backoff between retries.
//!
//! [`BackoffPolicy`] computes the pause before retry `n` as `first × factor^n`, clamped
//! to `max`, with jitter applied last. The base is derived from the attempt number
//! alone, so jitter never feeds back into later delays.
//!
//! [`BackoffPolicy::retry_up_to`] turns a backoff curve into a [`RetryPolicy`] for
//! [`Retry`](crate::wrappers::Retry).
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use actionvisor::{ActionError, BackoffPolicy, JitterPolicy, RetryPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//! assert_eq!(backoff.next(1), Duration::from_millis(200));
//! assert_eq!(backoff.next(10), Duration::from_secs(10));
//!
//! let policy = backoff.retry_up_to(2);
//! let err = ActionError::msg("busy");
//! assert_eq!(policy.on_failure(1, &err), Some(Duration::from_millis(100)));
//! assert_eq!(policy.on_failure(2, &err), Some(Duration::from_millis(200)));
//! assert_eq!(policy.on_failure(3, &err), None);
//! ```

use std::time::Duration;

use crate::error::ActionError;

use super::jitter::JitterPolicy;
use super::retry::RetryPolicy;

/// Delay curve between retries.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Growth factor per retry (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied to each delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant 100ms delays, capped at 30s, without jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Delay for the given retry (0-indexed).
    pub fn next(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if secs.is_finite() && (0.0..=self.max.as_secs_f64()).contains(&secs) {
            Duration::from_secs_f64(secs)
        } else {
            self.max
        };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            other => other.apply(base),
        }
    }

    /// Retry policy allowing at most `retries` retries with this backoff.
    pub fn retry_up_to(self, retries: u32) -> BackoffRetry {
        BackoffRetry {
            backoff: self,
            retries,
        }
    }
}

/// [`RetryPolicy`] built from a [`BackoffPolicy`] and a retry budget.
#[derive(Clone, Copy, Debug)]
pub struct BackoffRetry {
    backoff: BackoffPolicy,
    retries: u32,
}

impl BackoffRetry {
    /// Maximum number of retries.
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

impl RetryPolicy for BackoffRetry {
    fn on_failure(&self, failures: u32, _error: &ActionError) -> Option<Duration> {
        if failures == 0 || failures > self.retries {
            return None;
        }
        Some(self.backoff.next(failures - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exponential(jitter: JitterPolicy) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter,
        }
    }

    #[test]
    fn test_exponential_growth_no_jitter() {
        let policy = exponential(JitterPolicy::None);
        let delays: Vec<u128> = (0..5).map(|n| policy.next(n).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600]);
    }

    #[test]
    fn test_first_exceeds_max() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            ..exponential(JitterPolicy::None)
        };
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn test_overflow_clamps_to_max() {
        let policy = exponential(JitterPolicy::None);
        assert_eq!(policy.next(100), Duration::from_secs(30));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_equal_jitter_bounds() {
        let policy = exponential(JitterPolicy::Equal);
        for attempt in 0..15 {
            let base = (100.0 * 2.0f64.powi(attempt as i32)).min(30_000.0) as u64;
            let delay = policy.next(attempt);
            assert!(delay >= Duration::from_millis(base / 2), "attempt {attempt}: {delay:?}");
            assert!(delay <= Duration::from_millis(base), "attempt {attempt}: {delay:?}");
        }
    }

    #[test]
    fn test_full_jitter_never_exceeds_base() {
        let policy = exponential(JitterPolicy::Full);
        for attempt in 5..15 {
            let base = (100.0 * 2.0f64.powi(attempt as i32)).min(30_000.0) as u64;
            assert!(policy.next(attempt) <= Duration::from_millis(base));
        }
    }

    #[test]
    fn test_retry_budget() {
        let policy = BackoffPolicy::default().retry_up_to(3);
        let err = ActionError::msg("flaky");
        assert_eq!(policy.on_failure(1, &err), Some(Duration::from_millis(100)));
        assert_eq!(policy.on_failure(3, &err), Some(Duration::from_millis(100)));
        assert_eq!(policy.on_failure(4, &err), None);
        assert_eq!(BackoffPolicy::default().retry_up_to(0).on_failure(1, &err), None);
    }
}
