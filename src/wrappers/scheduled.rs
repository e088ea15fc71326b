//! # Scheduled: run an action at a wall-clock time.
//!
//! [`Scheduled`] waits (abortably, through an owned [`Pause`]) until its time of
//! execution and then runs its action. A time already in the past is a usage error
//! unless the action was created with `run_if_past`, in which case it runs at once.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::actions::{ActionExt, ActionRef, Context, SyncAction, SyncBody};
use crate::error::{ActionError, UsageError};

use super::pause::Pause;

/// Time-triggered wrapper body.
pub struct Scheduled {
    action: ActionRef,
    pause: Arc<SyncAction<Pause>>,
    at: Mutex<SystemTime>,
    run_if_past: bool,
}

impl Scheduled {
    /// Wraps `action` (taking ownership of it) to run at `at`.
    pub fn new(
        action: ActionRef,
        at: SystemTime,
        run_if_past: bool,
    ) -> Result<Arc<SyncAction<Self>>, UsageError> {
        let pause = Pause::new(Duration::ZERO);
        let scheduled = SyncAction::new(Self {
            action: Arc::clone(&action),
            pause: Arc::clone(&pause),
            at: Mutex::new(at),
            run_if_past,
        });
        scheduled.take_ownership(action)?;
        scheduled.take_ownership(pause)?;
        Ok(scheduled)
    }

    /// The time of execution.
    pub fn time(&self) -> SystemTime {
        *self.at.lock()
    }

    /// Moves the time of execution; a wait in progress adjusts to it.
    pub fn set_time(&self, at: SystemTime) -> Result<(), UsageError> {
        let wait = at.duration_since(SystemTime::now());
        if wait.is_err() && !self.run_if_past {
            return Err(self.in_past(at));
        }

        *self.at.lock() = at;
        match wait {
            Ok(wait) => {
                self.pause.set_duration(wait);
                self.pause.restart();
            }
            Err(_) => self.pause.cut_short(),
        }
        Ok(())
    }

    /// Ends a wait in progress and runs the action now.
    pub fn skip_wait(&self) {
        self.pause.cut_short();
    }

    fn in_past(&self, at: SystemTime) -> UsageError {
        let action = self
            .action
            .parent()
            .map_or_else(|| self.action.description(), |owner| owner.description());
        UsageError::ScheduledInPast {
            action,
            at: iso8601(at),
        }
    }
}

impl SyncBody for Scheduled {
    fn name(&self) -> &str {
        "Scheduled"
    }

    fn describe(&self) -> String {
        format!(
            "Time to execute: {}; Run immediately if time is in the past? {}",
            iso8601(self.time()),
            if self.run_if_past { "yes" } else { "no" }
        )
    }

    fn run(&self, _cx: &Context<'_>) -> Result<(), ActionError> {
        let at = self.time();
        match at.duration_since(SystemTime::now()) {
            Ok(wait) => {
                self.pause.set_duration(wait);
                self.pause.sync_execute()?;
            }
            Err(_) if self.run_if_past => {}
            Err(_) => return Err(self.in_past(at).into()),
        }
        self.action.sync_execute()
    }
}

pub(crate) fn iso8601(at: SystemTime) -> String {
    DateTime::<Utc>::from(at).format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Action;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Instant;

    use crate::actions::ActionFn;

    fn marker(ran: &Arc<AtomicBool>) -> ActionRef {
        let ran = Arc::clone(ran);
        ActionFn::arc("marker", move |_| {
            ran.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_runs_after_the_time() {
        let ran = Arc::new(AtomicBool::new(false));
        let at = SystemTime::now() + Duration::from_millis(40);
        let scheduled = Scheduled::new(marker(&ran), at, false).unwrap();

        scheduled.sync_execute().unwrap();
        assert!(SystemTime::now() + Duration::from_millis(5) >= at);
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_past_time_is_rejected_unless_allowed() {
        let ran = Arc::new(AtomicBool::new(false));
        let past = SystemTime::now() - Duration::from_secs(60);

        let strict = Scheduled::new(marker(&ran), past, false).unwrap();
        let err = strict.sync_execute().unwrap_err();
        assert!(matches!(err.as_usage(), Some(UsageError::ScheduledInPast { .. })));
        assert!(!ran.load(Ordering::SeqCst));
        assert!(strict.set_time(past).is_err());

        let lenient = Scheduled::new(marker(&ran), past, true).unwrap();
        lenient.sync_execute().unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_skip_wait_runs_now() {
        let ran = Arc::new(AtomicBool::new(false));
        let scheduled = Scheduled::new(marker(&ran), SystemTime::now() + Duration::from_secs(3600), false).unwrap();

        let s = Arc::clone(&scheduled);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            s.skip_wait();
        });
        let started = Instant::now();
        scheduled.sync_execute().unwrap();
        assert!(started.elapsed() < Duration::from_secs(60));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_description_shows_time() {
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(86_400);
        let scheduled = Scheduled::new(ActionFn::arc("noop", |_| Ok(())), at, true).unwrap();
        assert_eq!(
            scheduled.extended_description(),
            "Time to execute: 1970-01-02T00:00:00Z; Run immediately if time is in the past? yes"
        );
    }
}
