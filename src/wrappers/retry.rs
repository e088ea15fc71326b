//! # Retry: run an action again after failures.
//!
//! [`Retry`] runs its action; on failure it asks its [`RetryPolicy`] how long to wait,
//! pauses with an owned [`Pause`] (so the wait stays abortable) and tries again.
//! Aborts are never retried.

use std::sync::Arc;
use std::time::Duration;

use crate::actions::{ActionExt, ActionRef, Context, SyncAction, SyncBody};
use crate::error::{ActionError, UsageError};
use crate::policies::RetryPolicy;

use super::pause::Pause;

/// Retrying wrapper body.
pub struct Retry {
    action: ActionRef,
    pause: Arc<SyncAction<Pause>>,
    policy: Box<dyn RetryPolicy>,
}

impl Retry {
    /// Wraps `action` (taking ownership of it) with `policy`.
    pub fn new<P: RetryPolicy>(action: ActionRef, policy: P) -> Result<Arc<SyncAction<Self>>, UsageError> {
        let pause = Pause::new(Duration::ZERO);
        let retry = SyncAction::new(Self {
            action: Arc::clone(&action),
            pause: Arc::clone(&pause),
            policy: Box::new(policy),
        });
        retry.take_ownership(action)?;
        retry.take_ownership(pause)?;
        Ok(retry)
    }

    /// The wrapped action.
    pub fn action(&self) -> &ActionRef {
        &self.action
    }
}

impl SyncBody for Retry {
    fn name(&self) -> &str {
        "Retry"
    }

    fn run(&self, cx: &Context<'_>) -> Result<(), ActionError> {
        let mut failures = 0u32;
        loop {
            cx.check_abort()?;
            let err = match self.action.sync_execute() {
                Ok(()) => return Ok(()),
                Err(err) if err.is_aborted() => return Err(err),
                Err(err) => err,
            };

            failures = failures.saturating_add(1);
            let Some(delay) = self.policy.on_failure(failures, &err) else {
                return Err(err);
            };
            tracing::debug!(
                action = %self.action.description(),
                failures,
                delay = ?delay,
                error = %err,
                "retrying"
            );
            self.pause.set_duration(delay);
            self.pause.sync_execute()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::actions::ActionFn;
    use crate::policies::BackoffPolicy;

    fn flaky(succeed_on: u32, attempts: &Arc<AtomicU32>) -> ActionRef {
        let attempts = Arc::clone(attempts);
        ActionFn::arc("flaky", move |_| {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= succeed_on {
                Ok(())
            } else {
                Err(ActionError::msg(format!("attempt {n} failed")))
            }
        })
    }

    fn quick() -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(1),
            ..BackoffPolicy::default()
        }
    }

    #[test]
    fn test_retries_until_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let retry = Retry::new(flaky(3, &attempts), quick().retry_up_to(5)).unwrap();

        retry.sync_execute().unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_gives_up_with_last_error() {
        let attempts = Arc::new(AtomicU32::new(0));
        let retry = Retry::new(flaky(100, &attempts), quick().retry_up_to(2)).unwrap();

        let err = retry.sync_execute().unwrap_err();
        assert_eq!(err.to_string(), "attempt 3 failed");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_aborted_is_not_retried() {
        let asked = Arc::new(AtomicU32::new(0));
        let a = Arc::clone(&asked);
        let retry = Retry::new(
            ActionFn::arc("aborts", |_| Err(ActionError::Aborted)),
            move |_: u32, _: &ActionError| {
                a.fetch_add(1, Ordering::SeqCst);
                Some(Duration::ZERO)
            },
        )
        .unwrap();

        assert!(retry.sync_execute().unwrap_err().is_aborted());
        assert_eq!(asked.load(Ordering::SeqCst), 0);
    }
}
