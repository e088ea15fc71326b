//! # Completion contract of asynchronous execution.
//!
//! [`Listener`] is what a caller hands to
//! [`ActionExt::async_execute`](crate::ActionExt::async_execute); it receives exactly one
//! [`Outcome`]. Any `FnOnce(Outcome) + Send` closure is a listener.
//!
//! [`Completion`] is what an action implementation receives in
//! [`Action::execute_callback`](crate::Action::execute_callback). It is a single-owner
//! handle: finishing it consumes it, so an implementation cannot report twice.
//!
//! ## Rules
//! - A completion created by `async_execute` must be finished on a thread other than the
//!   one that called `async_execute`; otherwise `finish` returns
//!   [`UsageError::SameThreadCallback`] and the listener is never called.
//! - Finishing closes the action's execution: monitors are notified, the listener runs,
//!   then the done signal is set.
//! - Dropping an unfinished completion is a bug in the action; it is logged and the
//!   execution is closed as failed with [`UsageError::CompletionDropped`].
//! - If `execute_callback` returns an error or panics, the execution is closed with
//!   that error (a panic becomes [`Panicked`]) and the listener is not called.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::error::{ActionError, Panicked, UsageError};

use super::action::{ActionExt, ActionRef};

/// Three-way result of one execution.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The action completed its work.
    Succeeded,
    /// The action stopped because its tree was aborted.
    Aborted,
    /// The action failed; carries the original error.
    Failed(ActionError),
}

impl Outcome {
    /// Classifies an execution result.
    pub fn from_result(result: Result<(), ActionError>) -> Self {
        match result {
            Ok(()) => Outcome::Succeeded,
            Err(ActionError::Aborted) => Outcome::Aborted,
            Err(err) => Outcome::Failed(err),
        }
    }

    /// Converts back into the `Result` a blocking caller would see.
    pub fn into_result(self) -> Result<(), ActionError> {
        match self {
            Outcome::Succeeded => Ok(()),
            Outcome::Aborted => Err(ActionError::Aborted),
            Outcome::Failed(err) => Err(err),
        }
    }

    /// Returns the error this outcome carries (`Aborted` for aborts).
    pub fn error(&self) -> Option<ActionError> {
        match self {
            Outcome::Succeeded => None,
            Outcome::Aborted => Some(ActionError::Aborted),
            Outcome::Failed(err) => Some(err.clone()),
        }
    }

    /// True for [`Outcome::Succeeded`].
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }

    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Outcome::Succeeded => "succeeded",
            Outcome::Aborted => "aborted",
            Outcome::Failed(_) => "failed",
        }
    }
}

/// Receives the outcome of an asynchronous execution.
pub trait Listener: Send + 'static {
    /// Called exactly once, on a thread other than the caller's.
    fn on_finished(self: Box<Self>, outcome: Outcome);
}

impl<F> Listener for F
where
    F: FnOnce(Outcome) + Send + 'static,
{
    fn on_finished(self: Box<Self>, outcome: Outcome) {
        (*self)(outcome)
    }
}

/// Calls a listener, containing any panic it raises.
pub(crate) fn notify(listener: Box<dyn Listener>, outcome: Outcome) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener.on_finished(outcome))) {
        let panicked = Panicked::from_payload(payload.as_ref());
        tracing::error!(error = %panicked, "listener panicked");
    }
}

enum Target {
    /// Closes an execution started by `async_execute`.
    Tracked(Arc<Pending>),
    /// Plain callback, used by the blocking bridge.
    Direct(Box<dyn Listener>),
}

/// Execution state shared by a tracked completion and the launch that created it.
struct Pending {
    action: ActionRef,
    state: Mutex<PendingState>,
}

struct PendingState {
    /// Taken by whoever closes the execution.
    listener: Option<Box<dyn Listener>>,
    /// True until `execute_callback` has returned.
    launching: bool,
    /// The completion was dropped unfinished while launching.
    abandoned: bool,
}

impl Pending {
    /// Closes the execution with `result`, calling the listener.
    fn close(
        &self,
        listener: Box<dyn Listener>,
        result: &Result<(), ActionError>,
    ) -> Result<(), UsageError> {
        self.action.core().finish(&*self.action, result, Some(listener))
    }

    /// Handles a completion dropped without being finished.
    fn abandon(&self) {
        let listener = {
            let mut state = self.state.lock();
            if state.listener.is_none() {
                return;
            }
            if state.launching {
                state.abandoned = true;
                return;
            }
            state.listener.take()
        };

        if let Some(listener) = listener {
            tracing::error!(
                action = %self.action.description(),
                "completion dropped without being finished"
            );
            report(self.close(listener, &Err(UsageError::CompletionDropped.into())));
        }
    }
}

/// Launcher's side of a tracked completion; settles the execution once
/// `execute_callback` has returned.
pub(crate) struct Launch {
    pending: Arc<Pending>,
}

impl Launch {
    /// Closes the execution if the launch failed or abandoned its completion.
    ///
    /// A failed launch closes without calling the listener and returns the error.
    pub(crate) fn settle(self, launched: Result<(), ActionError>) -> Result<(), ActionError> {
        let listener = {
            let mut state = self.pending.state.lock();
            state.launching = false;
            if launched.is_err() || state.abandoned {
                state.listener.take()
            } else {
                None
            }
        };

        match launched {
            Ok(()) => {
                if let Some(listener) = listener {
                    tracing::error!(
                        action = %self.pending.action.description(),
                        "completion dropped without being finished"
                    );
                    report(self.pending.close(listener, &Err(UsageError::CompletionDropped.into())));
                }
                Ok(())
            }
            Err(err) => {
                if listener.is_some() {
                    let action = &self.pending.action;
                    action.core().finish(&**action, &Err(err.clone()), None)?;
                } else {
                    tracing::warn!(error = %err, "launch failed after its completion was finished");
                }
                Err(err)
            }
        }
    }
}

/// Single-use handle an asynchronous action finishes when its work is over.
///
/// Dropping a tracked completion without finishing it closes the execution as
/// failed with [`UsageError::CompletionDropped`], so the action never stays busy.
pub struct Completion {
    target: Option<Target>,
    origin: ThreadId,
}

impl Completion {
    pub(crate) fn tracked(action: ActionRef, listener: Box<dyn Listener>) -> (Self, Launch) {
        let pending = Arc::new(Pending {
            action,
            state: Mutex::new(PendingState {
                listener: Some(listener),
                launching: true,
                abandoned: false,
            }),
        });
        let completion = Self {
            target: Some(Target::Tracked(Arc::clone(&pending))),
            origin: thread::current().id(),
        };
        (completion, Launch { pending })
    }

    pub(crate) fn direct(listener: Box<dyn Listener>) -> Self {
        Self {
            target: Some(Target::Direct(listener)),
            origin: thread::current().id(),
        }
    }

    /// True when called from the thread that started the execution.
    pub fn is_origin_thread(&self) -> bool {
        thread::current().id() == self.origin
    }

    /// Reports the result of the execution.
    ///
    /// On the origin thread this returns [`UsageError::SameThreadCallback`] and
    /// leaves the execution open; the dropped handle then closes it as failed.
    pub fn finish(mut self, result: Result<(), ActionError>) -> Result<(), UsageError> {
        match self.target.take() {
            None => Ok(()),
            Some(Target::Tracked(pending)) => {
                if self.is_origin_thread() {
                    let err = UsageError::SameThreadCallback {
                        action: pending.action.description(),
                    };
                    self.target = Some(Target::Tracked(pending));
                    return Err(err);
                }
                let listener = pending.state.lock().listener.take();
                match listener {
                    Some(listener) => pending.close(listener, &result),
                    None => Ok(()),
                }
            }
            Some(Target::Direct(listener)) => {
                notify(listener, Outcome::from_result(result));
                Ok(())
            }
        }
    }

    /// Reports success.
    pub fn succeed(self) -> Result<(), UsageError> {
        self.finish(Ok(()))
    }

    /// Reports that the action was aborted.
    pub fn abort(self) -> Result<(), UsageError> {
        self.finish(Err(ActionError::Aborted))
    }

    /// Reports a failure.
    pub fn fail(self, error: ActionError) -> Result<(), UsageError> {
        self.finish(Err(error))
    }

    /// Finishes from a fresh thread when called on the origin thread.
    ///
    /// Composites use this when their result becomes known while still inside
    /// `execute_callback` (empty child list, every child failing to launch).
    pub(crate) fn deliver(self, result: Result<(), ActionError>) {
        if !self.is_origin_thread() {
            report(self.finish(result));
            return;
        }

        let spawned = thread::Builder::new()
            .name("actionvisor-completion".to_string())
            .spawn(move || report(self.finish(result)));
        if let Err(err) = spawned {
            tracing::error!(error = %err, "failed to spawn completion thread");
        }
    }

    /// Drops the completion without reporting.
    ///
    /// Used when `execute_callback` returns an error, which closes the execution instead.
    pub(crate) fn disarm(mut self) {
        self.target = None;
    }
}

fn report(result: Result<(), UsageError>) {
    if let Err(err) = result {
        tracing::error!(error = %err, label = err.as_label(), "completion rejected");
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        match self.target.take() {
            Some(Target::Tracked(pending)) => pending.abandon(),
            Some(Target::Direct(listener)) => {
                tracing::error!("completion dropped without being finished");
                notify(listener, Outcome::Failed(UsageError::CompletionDropped.into()));
            }
            None => {}
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.target {
            None => "finished",
            Some(Target::Tracked(_)) => "tracked",
            Some(Target::Direct(_)) => "direct",
        };
        f.debug_struct("Completion")
            .field("target", &kind)
            .field("origin", &self.origin)
            .finish()
    }
}
