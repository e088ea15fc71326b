//! # Recurring: run an action at caller-chosen times.
//!
//! [`Recurring`] asks an [`ExecutionTimes`] source for the first time of execution,
//! runs its action then (through an owned [`Scheduled`]), asks for the next time, and
//! so on until the source returns `None`. Times already in the past run immediately.

use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::actions::{ActionExt, ActionRef, Context, SyncAction, SyncBody};
use crate::error::{ActionError, UsageError};

use super::scheduled::Scheduled;

/// Source of execution times for a [`Recurring`].
pub trait ExecutionTimes: Send + 'static {
    /// First time of execution, or `None` to not run at all.
    fn first_time(&mut self) -> Option<SystemTime>;

    /// Time following `previous` (the time the last run was scheduled for), or
    /// `None` to stop.
    fn next_time(&mut self, previous: SystemTime) -> Option<SystemTime>;
}

/// Calendar-driven wrapper body.
pub struct Recurring {
    scheduled: Arc<SyncAction<Scheduled>>,
    times: Mutex<Box<dyn ExecutionTimes>>,
}

impl Recurring {
    /// Wraps `action` (taking ownership of it).
    pub fn new<T: ExecutionTimes>(action: ActionRef, times: T) -> Result<Arc<SyncAction<Self>>, UsageError> {
        let scheduled = Scheduled::new(action, SystemTime::now(), true)?;
        let recurring = SyncAction::new(Self {
            scheduled: Arc::clone(&scheduled),
            times: Mutex::new(Box::new(times)),
        });
        recurring.take_ownership(scheduled)?;
        Ok(recurring)
    }

    /// Ends the wait in progress; the action runs right away.
    pub fn skip_current_wait(&self) {
        self.scheduled.skip_wait();
    }

    /// Moves the pending time of execution.
    pub fn set_next_time(&self, at: SystemTime) -> Result<(), UsageError> {
        self.scheduled.set_time(at)
    }
}

impl SyncBody for Recurring {
    fn name(&self) -> &str {
        "Recurring"
    }

    fn run(&self, cx: &Context<'_>) -> Result<(), ActionError> {
        let mut next = self.times.lock().first_time();
        while let Some(at) = next {
            self.scheduled.set_time(at)?;
            cx.check_abort()?;
            self.scheduled.sync_execute()?;

            let previous = self.scheduled.time();
            next = self.times.lock().next_time(previous);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::actions::ActionFn;

    struct EveryFewMillis {
        left: usize,
    }

    impl ExecutionTimes for EveryFewMillis {
        fn first_time(&mut self) -> Option<SystemTime> {
            self.next_time(SystemTime::now())
        }

        fn next_time(&mut self, previous: SystemTime) -> Option<SystemTime> {
            if self.left == 0 {
                return None;
            }
            self.left -= 1;
            Some(previous + Duration::from_millis(10))
        }
    }

    fn ticker(ticks: &Arc<AtomicUsize>) -> ActionRef {
        let ticks = Arc::clone(ticks);
        ActionFn::arc("tick", move |_| {
            ticks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_runs_until_source_is_exhausted() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let recurring = Recurring::new(ticker(&ticks), EveryFewMillis { left: 3 }).unwrap();

        recurring.sync_execute().unwrap();
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_empty_source_never_runs() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let recurring = Recurring::new(ticker(&ticks), EveryFewMillis { left: 0 }).unwrap();

        recurring.sync_execute().unwrap();
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_skip_current_wait() {
        struct OnceInAnHour;

        impl ExecutionTimes for OnceInAnHour {
            fn first_time(&mut self) -> Option<SystemTime> {
                Some(SystemTime::now() + Duration::from_secs(3600))
            }

            fn next_time(&mut self, _previous: SystemTime) -> Option<SystemTime> {
                None
            }
        }

        let ticks = Arc::new(AtomicUsize::new(0));
        let recurring = Recurring::new(ticker(&ticks), OnceInAnHour).unwrap();
        let r = Arc::clone(&recurring);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            r.skip_current_wait();
        });

        let started = Instant::now();
        recurring.sync_execute().unwrap();
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }
}
