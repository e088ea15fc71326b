//! # actionvisor
//!
//! **Actionvisor** coordinates cancellable units of work ("actions") across threads.
//!
//! Every action can be run in two ways: blocking the caller, or started with a
//! listener that receives the outcome on another thread. Actions nest into ownership
//! trees that share one abort signal, so aborting a root cooperatively cancels the
//! whole tree. Composites chain children in sequence or run them in parallel, and a
//! dispatcher bounds how many roots run at once.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                     ┌──────────────────────────────┐
//!                     │  Dispatcher (pool_size = N)  │
//!                     │  running: [root, root]       │
//!                     │  backlog: [root, ...] (FIFO) │
//!                     └──────┬────────────────┬──────┘
//!                            ▼                ▼
//!                 ┌────────────────┐  ┌────────────────┐
//!                 │ Sequence (root)│  │ Parallel (root)│
//!                 │ abort ◄─ shared│  │ abort ◄─ shared│
//!                 └──┬──────────┬──┘  └──┬──────────┬──┘
//!                    ▼          ▼        ▼          ▼
//!                 ActionFn    Pause    Retry    TimeLimited
//!                                        │          │
//!                                        ▼          ▼
//!                                     ActionFn  AbortLinked (root, watches its limiter)
//!
//! every execution ──► MonitorSet (global registry + dispatcher monitors)
//!                      ├─► TraceMonitor (tracing events)
//!                      └─► LogWriter    (one line per start/finish)
//! ```
//!
//! ### Lifecycle of one execution
//! ```text
//! sync_execute / async_execute
//!   ├─► wait for the previous execution's done signal, reset it
//!   ├─► root? reset the tree's abort signal
//!   ├─► executing += 1, monitors.on_starting
//!   ├─► run (blocking body, or callback body finishing a Completion off-thread)
//!   └─► executing -= 1 ─► last one: monitors.on_finished ─► listener ─► done.set()
//! ```
//!
//! ## Features
//! | Area            | Description                                              | Key types / traits                          |
//! |-----------------|----------------------------------------------------------|---------------------------------------------|
//! | **Actions**     | Define actions as closures or bodies, run either way.    | [`Action`], [`ActionExt`], [`ActionFn`]     |
//! | **Bridges**     | Derive the missing execution form from the native one.   | [`SyncAction`], [`AsyncAction`]             |
//! | **Composites**  | Chain or fan out children.                               | [`Sequence`], [`Parallel`]                  |
//! | **Wrappers**    | Pauses, deadlines, retries, cleanup, schedules.          | [`Pause`], [`TimeLimited`], [`Retry`], ...  |
//! | **Dispatch**    | Bounded admission of root actions.                       | [`Dispatcher`], [`DispatcherConfig`]        |
//! | **Monitors**    | Observe every start and finish.                          | [`Monitor`], [`MonitorSet`]                 |
//! | **Signals**     | Latches and multi-waits the framework is built on.       | [`Signal`], [`WaitGroup`]                   |
//! | **Errors**      | Typed outcome and invariant-violation errors.            | [`ActionError`], [`UsageError`]             |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`], a monitor writing one line per event.
//! - `tokio`: exposes [`interop`] to `.await` actions and abort them through a `CancellationToken`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use actionvisor::{ActionError, ActionExt, ActionFn, ActionRef, BackoffPolicy, Pause, Retry, Sequence};
//!
//! let fetch = ActionFn::arc("fetch", |ctx| {
//!     ctx.check_abort()?;
//!     Ok(())
//! });
//! let policy = BackoffPolicy {
//!     first: Duration::from_millis(1),
//!     ..BackoffPolicy::default()
//! };
//!
//! let pipeline = Sequence::from_actions([
//!     Retry::new(fetch, policy.retry_up_to(3))? as ActionRef,
//!     Pause::new(Duration::from_millis(1)) as ActionRef,
//! ])?;
//! pipeline.sync_execute()?;
//! assert!(pipeline.done_signal().is_signaled());
//! # Ok::<(), ActionError>(())
//! ```

mod actions;
mod composite;
mod dispatch;
mod error;
mod policies;
mod signals;

pub mod monitors;
pub mod wrappers;

#[cfg(feature = "tokio")]
pub mod interop;

// ---- Public re-exports ----

pub use actions::{
    Action, ActionCore, ActionExt, ActionFn, ActionRef, AsyncAction, AsyncBody, Completion, Context,
    Listener, Outcome, SyncAction, SyncBody, bind,
};
pub use composite::{Parallel, Sequence};
pub use dispatch::{Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::{ActionError, BoxError, ErrorKind, Panicked, UsageError};
pub use monitors::{Monitor, MonitorSet, TraceMonitor};
pub use policies::{BackoffPolicy, BackoffRetry, JitterPolicy, RetryPolicy};
pub use signals::{Signal, SignalListener, WaitGroup, on_all_set};
pub use wrappers::{
    AbortLinked, ExecutionTimes, Finally, IntervalKind, Pause, Periodic, PeriodicConfig, Recurring,
    Retry, Scheduled, TimeLimited, Variable,
};

// Optional: a line-per-event monitor writing to a stream or file.
// Enable with: `--features logging` (on by default)
#[cfg(feature = "logging")]
pub use monitors::LogWriter;
