//! Wrapper actions built on the core contract.
//!
//! ## Contents
//! - [`AbortLinked`] root owning one action and watching another one's abort
//! - [`Pause`] abortable wait that can be cut short or restarted
//! - [`TimeLimited`] deadline around an action
//! - [`Retry`] reruns an action on failure according to a [`RetryPolicy`](crate::RetryPolicy)
//! - [`Finally`] action followed by a cleanup
//! - [`Variable`] swappable slot holding one action
//! - [`Periodic`] repeats an action with an interval
//! - [`Scheduled`] runs an action at a wall-clock time
//! - [`Recurring`] runs an action at times produced by an [`ExecutionTimes`] source
//!
//! Most wrappers are bodies for [`SyncAction`](crate::SyncAction): their factories
//! return `Arc<SyncAction<Wrapper>>`, which dereferences to the wrapper for its own
//! methods (`pause.cut_short()`, `periodic.stop()`, ...).

mod abort_linked;
mod finally;
mod pause;
mod periodic;
mod recurring;
mod retry;
mod scheduled;
mod time_limited;
mod variable;

pub use abort_linked::AbortLinked;
pub use finally::Finally;
pub use pause::Pause;
pub use periodic::{IntervalKind, Periodic, PeriodicConfig};
pub use recurring::{ExecutionTimes, Recurring};
pub use retry::Retry;
pub use scheduled::Scheduled;
pub use time_limited::TimeLimited;
pub use variable::Variable;
