//! # Periodic: repeat an action with an interval.
//!
//! [`Periodic`] runs its action `repetitions` times with a pause of `interval` between
//! runs.
//!
//! ## Interval kinds
//! ```text
//! exclusive, PauseAfter:   [action ─► pause] × N           (pause after the last run skipped)
//! exclusive, PauseBefore:  [pause ─► action] × N
//! inclusive, PauseAfter:   [action ∥ pause] × N            (period = max(action, interval))
//! inclusive, PauseBefore:  pause ─► [action ∥ pause] × N
//! ```
//! In inclusive mode the action and the pause run in a [`Parallel`] that aborts the
//! other on failure. A trailing pause is never waited on the last repetition.
//!
//! `stop()` ends the current execution after the run in progress; an optional external
//! stop signal does the same.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::actions::{ActionExt, ActionRef, Context, SyncAction, SyncBody};
use crate::composite::{Parallel, Sequence};
use crate::error::{ActionError, UsageError};
use crate::signals::Signal;

use super::pause::Pause;

/// Where the interval pause sits relative to the action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntervalKind {
    /// Wait before each run.
    PauseBefore,
    /// Wait after each run.
    #[default]
    PauseAfter,
}

/// Construction parameters of a [`Periodic`].
#[derive(Clone, Debug)]
pub struct PeriodicConfig {
    /// Number of runs.
    pub repetitions: usize,
    /// Pause between runs.
    pub interval: Duration,
    /// Pause before or after each run.
    pub kind: IntervalKind,
    /// Whether the interval includes the run time of the action.
    pub inclusive: bool,
    /// Ends the repetitions early when set.
    pub stop: Option<Arc<Signal>>,
}

impl Default for PeriodicConfig {
    /// One run, no interval, pause after, exclusive, no stop signal.
    fn default() -> Self {
        Self {
            repetitions: 1,
            interval: Duration::ZERO,
            kind: IntervalKind::PauseAfter,
            inclusive: false,
            stop: None,
        }
    }
}

/// Repeating wrapper body.
pub struct Periodic {
    collection: ActionRef,
    initial_pause: Arc<SyncAction<Pause>>,
    pause: Arc<SyncAction<Pause>>,
    start_with_pause: bool,
    trailing_pause: bool,
    repetitions: AtomicUsize,
    halt: Arc<Signal>,
    stop: Option<Arc<Signal>>,
}

impl Periodic {
    /// Wraps `action` (taking ownership of it).
    pub fn new(action: ActionRef, config: PeriodicConfig) -> Result<Arc<SyncAction<Self>>, UsageError> {
        let halt = Signal::new();
        let mut stops = vec![Arc::clone(&halt)];
        stops.extend(config.stop.iter().cloned());

        let pause = Pause::with_stop_signals(config.interval, stops.clone());
        let initial_pause = Pause::with_stop_signals(config.interval, stops);
        let as_step: ActionRef = pause.clone();

        let collection: ActionRef = match (config.inclusive, config.kind) {
            (true, _) => Parallel::from_actions(true, [action, as_step])?,
            (false, IntervalKind::PauseAfter) => Sequence::from_actions([action, as_step])?,
            (false, IntervalKind::PauseBefore) => Sequence::from_actions([as_step, action])?,
        };

        let periodic = SyncAction::new(Self {
            collection: Arc::clone(&collection),
            initial_pause: Arc::clone(&initial_pause),
            pause,
            start_with_pause: config.inclusive && config.kind == IntervalKind::PauseBefore,
            trailing_pause: config.inclusive || config.kind == IntervalKind::PauseAfter,
            repetitions: AtomicUsize::new(config.repetitions),
            halt,
            stop: config.stop,
        });
        periodic.take_ownership(initial_pause)?;
        periodic.take_ownership(collection)?;
        Ok(periodic)
    }

    /// Number of runs per execution.
    pub fn repetitions(&self) -> usize {
        self.repetitions.load(Ordering::SeqCst)
    }

    /// Changes the number of runs; takes effect on the next check.
    pub fn set_repetitions(&self, repetitions: usize) {
        self.repetitions.store(repetitions, Ordering::SeqCst);
    }

    /// The interval.
    pub fn interval(&self) -> Duration {
        self.pause.duration()
    }

    /// Changes the interval for the following waits.
    pub fn set_interval(&self, interval: Duration) {
        self.initial_pause.set_duration(interval);
        self.pause.set_duration(interval);
    }

    /// Ends the current execution after the run in progress.
    pub fn stop(&self) {
        self.halt.set();
    }

    /// Ends the wait in progress; the next run starts right away.
    pub fn skip_current_wait(&self) {
        self.initial_pause.cut_short();
        self.pause.cut_short();
    }

    /// Starts the wait in progress over.
    pub fn restart_wait(&self) {
        self.initial_pause.restart();
        self.pause.restart();
    }

    fn is_stopping(&self) -> bool {
        self.halt.is_signaled() || self.stop.as_ref().is_some_and(|s| s.is_signaled())
    }
}

impl SyncBody for Periodic {
    fn name(&self) -> &str {
        "Periodic"
    }

    fn describe(&self) -> String {
        format!(
            "Repetitions: {}; Interval: {}ms",
            self.repetitions(),
            self.interval().as_millis()
        )
    }

    fn prepare(&self) {
        self.halt.reset();
    }

    fn run(&self, cx: &Context<'_>) -> Result<(), ActionError> {
        if self.start_with_pause && self.repetitions() > 0 {
            self.initial_pause.sync_execute()?;
        }

        let mut run = 0;
        while run < self.repetitions() {
            if self.is_stopping() {
                break;
            }
            cx.check_abort()?;

            run += 1;
            if run == self.repetitions() && self.trailing_pause {
                let interval = self.pause.duration();
                self.pause.set_duration(Duration::ZERO);
                let result = self.collection.sync_execute();
                self.pause.set_duration(interval);
                result?;
            } else {
                self.collection.sync_execute()?;
            }
        }
        Ok(())
    }
}
