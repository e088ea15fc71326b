//! # TimeLimited: run an action under a deadline.
//!
//! The wrapped action runs inside an [`AbortLinked`] root watching the
//! [`TimeLimited`] action, so aborting the deadline wrapper still reaches it. When the
//! deadline expires first, the linked root is aborted and the wrapper returns
//! [`ActionError::Timeout`] right away, without waiting for the action to wind down.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::actions::{ActionExt, ActionRef, Context, Outcome, SyncAction, SyncBody};
use crate::error::{ActionError, UsageError};

use super::abort_linked::AbortLinked;

/// Deadline wrapper body.
pub struct TimeLimited {
    linked: Arc<SyncAction<AbortLinked>>,
    timeout: Duration,
}

impl TimeLimited {
    /// Wraps `action` (taking ownership of it) with a deadline of `timeout`.
    pub fn new(action: ActionRef, timeout: Duration) -> Result<Arc<SyncAction<Self>>, UsageError> {
        let linked = AbortLinked::unlinked(action)?;
        let limited = SyncAction::new(Self {
            linked: Arc::clone(&linked),
            timeout,
        });
        let watched: ActionRef = limited.clone();
        linked.link_to(&watched);
        Ok(limited)
    }

    /// The deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The wrapped action.
    pub fn action(&self) -> &ActionRef {
        self.linked.inner()
    }
}

impl SyncBody for TimeLimited {
    fn name(&self) -> &str {
        "TimeLimited"
    }

    fn describe(&self) -> String {
        format!("Timeout: {}ms", self.timeout.as_millis())
    }

    fn run(&self, _cx: &Context<'_>) -> Result<(), ActionError> {
        let slot = Arc::new(Mutex::new(None));
        let s = Arc::clone(&slot);
        self.linked
            .async_execute(move |outcome: Outcome| *s.lock() = Some(outcome))?;

        if !self.linked.wait_timeout(self.timeout) {
            self.linked.abort()?;
            let action = self.linked.inner().description();
            tracing::debug!(%action, timeout = ?self.timeout, "deadline expired");
            return Err(ActionError::Timeout {
                timeout: self.timeout,
                action,
            });
        }

        let outcome = slot.lock().take();
        outcome.map_or(Ok(()), Outcome::into_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    use crate::actions::ActionFn;
    use crate::error::ErrorKind;
    use crate::wrappers::Pause;

    #[test]
    fn test_fast_action_keeps_its_result() {
        let limited = TimeLimited::new(ActionFn::arc("quick", |_| Ok(())), Duration::from_secs(5)).unwrap();
        limited.sync_execute().unwrap();

        let failing =
            TimeLimited::new(ActionFn::arc("bad", |_| Err(ActionError::msg("bad input"))), Duration::from_secs(5))
                .unwrap();
        assert_eq!(failing.sync_execute().unwrap_err().to_string(), "bad input");
    }

    #[test]
    fn test_timeout_aborts_the_action() {
        let slow = Pause::new(Duration::from_secs(3600));
        let limited = TimeLimited::new(slow.clone(), Duration::from_millis(30)).unwrap();

        let started = Instant::now();
        let err = limited.sync_execute().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(5));

        assert!(slow.wait_timeout(Duration::from_secs(5)));
        assert_eq!(limited.action().id(), slow.id());
    }

    #[test]
    fn test_abort_reaches_the_action() {
        let limited = TimeLimited::new(Pause::new(Duration::from_secs(3600)), Duration::from_secs(3600)).unwrap();
        let l = Arc::clone(&limited);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            l.abort().unwrap();
        });
        assert!(limited.sync_execute().unwrap_err().is_aborted());
    }
}
