//! # Pause: a cancellable wait.
//!
//! [`Pause`] waits for its duration and succeeds. It ends early when:
//! - its tree is aborted (`Err(Aborted)`),
//! - [`Pause::cut_short`] is called or an external stop signal is set (success).
//!
//! [`Pause::restart`] starts the full duration over. Moving the pause into another
//! tree while it waits is noticed, and the wait continues on the new abort signal.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::actions::{Context, SyncAction, SyncBody};
use crate::error::ActionError;
use crate::signals::{Signal, WaitGroup};

const ABORTED: usize = 0;
const REWIRED: usize = 1;
const RESTARTED: usize = 2;

/// Timed wait body.
pub struct Pause {
    duration: Mutex<Duration>,
    cut_short: Arc<Signal>,
    restart: Arc<Signal>,
    stops: Vec<Arc<Signal>>,
}

impl Pause {
    /// Creates a pause of `duration`.
    pub fn new(duration: Duration) -> Arc<SyncAction<Self>> {
        Self::with_stop_signals(duration, Vec::new())
    }

    /// Creates a pause that also ends (successfully) when `stop` is set.
    pub fn with_stop_signal(duration: Duration, stop: Arc<Signal>) -> Arc<SyncAction<Self>> {
        Self::with_stop_signals(duration, vec![stop])
    }

    pub(crate) fn with_stop_signals(duration: Duration, stops: Vec<Arc<Signal>>) -> Arc<SyncAction<Self>> {
        SyncAction::new(Self {
            duration: Mutex::new(duration),
            cut_short: Signal::new(),
            restart: Signal::new(),
            stops,
        })
    }

    /// Ends the current wait successfully. No-op when not waiting.
    pub fn cut_short(&self) {
        self.cut_short.set();
    }

    /// Starts the current wait over with the (possibly updated) duration.
    pub fn restart(&self) {
        self.restart.set();
    }

    /// Length of the wait.
    pub fn duration(&self) -> Duration {
        *self.duration.lock()
    }

    /// Changes the length of the next wait (or of the current one after a restart).
    pub fn set_duration(&self, duration: Duration) {
        *self.duration.lock() = duration;
    }

    fn deadline(&self) -> Option<Instant> {
        Instant::now().checked_add(self.duration())
    }
}

impl SyncBody for Pause {
    fn name(&self) -> &str {
        "Pause"
    }

    fn describe(&self) -> String {
        format!("Duration: {}ms", self.duration().as_millis())
    }

    fn prepare(&self) {
        self.cut_short.reset();
        self.restart.reset();
    }

    fn run(&self, cx: &Context<'_>) -> Result<(), ActionError> {
        let mut deadline = self.deadline();
        loop {
            let rewired = cx.relinked_signal();
            rewired.reset();

            let mut group = WaitGroup::new();
            group.add(cx.abort_signal());
            group.add(rewired);
            group.add(Arc::clone(&self.restart));
            group.add(Arc::clone(&self.cut_short));
            for stop in &self.stops {
                group.add(Arc::clone(stop));
            }

            let fired = match deadline {
                Some(at) => group.wait_for_any_timeout(at.saturating_duration_since(Instant::now())),
                None => group.wait_for_any(),
            };
            match fired {
                Some(ABORTED) => return Err(ActionError::Aborted),
                Some(REWIRED) => continue,
                Some(RESTARTED) => {
                    self.restart.reset();
                    deadline = self.deadline();
                }
                _ => return Ok(()),
            }
        }
    }
}
