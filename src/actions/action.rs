//! # Action trait and the execution entry points.
//!
//! [`Action`] is the object-safe surface every action implements: it exposes its
//! [`ActionCore`] and its two native execution forms. Callers never invoke those
//! forms directly; they go through [`ActionExt`], which wraps each call in the
//! lifecycle (done signal, abort reset, re-entrancy counter, monitors).
//!
//! ## Architecture
//! ```text
//! ActionExt::sync_execute ──► begin ─► execute_blocking ─────────────► finish
//! ActionExt::async_execute ─► begin ─► execute_callback(Completion) ─► ... ─► Completion::finish ─► finish
//! ```
//!
//! ## Rules
//! - An action is executed zero or more times, never concurrently with itself.
//! - Only roots can be aborted; [`ActionExt::abort`] on an owned action is a usage error.
//! - The listener passed to `async_execute` runs exactly once, on another thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ActionError, Panicked, UsageError};
use crate::signals::Signal;

use super::core::{self as tree, ActionCore};
use super::listener::{Completion, Listener};

/// Shared handle to an action.
pub type ActionRef = Arc<dyn Action>;

/// # A cancellable, observably completing unit of work.
///
/// Implementations pick one native execution style, report it through
/// [`is_naturally_synchronous`](Action::is_naturally_synchronous) and implement the
/// other form in terms of it (see [`SyncAction`](super::SyncAction) and
/// [`AsyncAction`](super::AsyncAction), which do this for you).
pub trait Action: Send + Sync + 'static {
    /// Per-action bookkeeping.
    fn core(&self) -> &ActionCore;

    /// Type-level name used in descriptions and logs.
    fn name(&self) -> &str;

    /// Free-text state appended to the description.
    fn extended_description(&self) -> String {
        String::new()
    }

    /// True if the blocking form is the native one.
    fn is_naturally_synchronous(&self) -> bool;

    /// True for types that can never be owned.
    fn must_be_root(&self) -> bool {
        false
    }

    /// Parent used for descriptions when the action has no owner.
    fn linked_parent(&self) -> Option<ActionRef> {
        None
    }

    /// Called when the tree this action belongs to is aborted.
    fn on_abort(&self) {}

    /// Runs the action to completion on the calling thread.
    fn execute_blocking(&self) -> Result<(), ActionError>;

    /// Starts the action and returns; `completion` is finished from another thread.
    ///
    /// Returning an error means the action did not start and `completion` was not
    /// (and will not be) finished.
    fn execute_callback(&self, completion: Completion) -> Result<(), ActionError>;
}

/// Execution, cancellation and ownership operations available on every action.
pub trait ActionExt: Action {
    /// Process-wide unique id.
    fn id(&self) -> u64 {
        self.core().id()
    }

    /// The owner, or the watched action of a linked wrapper.
    fn parent(&self) -> Option<ActionRef> {
        self.core().owner().or_else(|| self.linked_parent())
    }

    /// Number of ancestors.
    fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent();
        while let Some(parent) = cursor {
            depth += 1;
            cursor = parent.parent();
        }
        depth
    }

    /// `Ancestor=>...=>Name(id)`, followed by the extended description when non-empty.
    fn description(&self) -> String {
        let mut names = Vec::new();
        let mut cursor = self.parent();
        while let Some(parent) = cursor {
            names.push(parent.name().to_string());
            cursor = parent.parent();
        }

        let mut text = String::new();
        for name in names.iter().rev() {
            text.push_str(name);
            text.push_str("=>");
        }
        text.push_str(self.name());
        text.push_str(&format!("({})", self.id()));

        let extended = self.extended_description();
        if !extended.is_empty() {
            text.push(' ');
            text.push_str(&extended);
        }
        text
    }

    /// Runs the action and blocks until it finishes.
    fn sync_execute(&self) -> Result<(), ActionError> {
        let this = ActionCore::begin(self)?;
        match panic::catch_unwind(AssertUnwindSafe(|| self.execute_blocking())) {
            Ok(result) => {
                this.core().finish(&*this, &result, None)?;
                result
            }
            Err(payload) => {
                let failure = Err(ActionError::failed(Panicked::from_payload(payload.as_ref())));
                let _ = this.core().finish(&*this, &failure, None);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Runs the action while temporarily owned by `owner`.
    ///
    /// Ownership is released on every exit path, so actions created on the fly inside
    /// a running action do not accumulate under it.
    fn sync_execute_within<O>(&self, owner: &O) -> Result<(), ActionError>
    where
        O: Action + ?Sized,
    {
        let this = self.core().this().ok_or_else(|| UsageError::Unbound {
            action: self.name().to_string(),
        })?;
        tree::adopt(owner, Arc::clone(&this))?;

        struct Release<'a, P: Action + ?Sized> {
            owner: &'a P,
            child: ActionRef,
        }
        impl<P: Action + ?Sized> Drop for Release<'_, P> {
            fn drop(&mut self) {
                if let Err(err) = tree::release(self.owner, &self.child) {
                    tracing::warn!(error = %err, "failed to release transient child");
                }
            }
        }

        let _release = Release { owner, child: this };
        self.sync_execute()
    }

    /// Starts the action; `listener` receives the outcome on another thread.
    ///
    /// If the action fails to start, the execution is closed with that error, the
    /// listener is not called and the error is returned. A panic while starting is
    /// returned as a [`Panicked`] failure instead of unwinding into the caller.
    fn async_execute<L: Listener>(&self, listener: L) -> Result<(), ActionError> {
        let this = ActionCore::begin(self)?;
        let (completion, launch) = Completion::tracked(this, Box::new(listener));
        let launched = panic::catch_unwind(AssertUnwindSafe(|| self.execute_callback(completion)))
            .unwrap_or_else(|payload| Err(ActionError::failed(Panicked::from_payload(payload.as_ref()))));
        launch.settle(launched)
    }

    /// Requests cooperative cancellation of the whole tree. Returns immediately.
    fn abort(&self) -> Result<(), UsageError> {
        if self.core().has_owner() {
            return Err(UsageError::NotRoot {
                action: self.description(),
            });
        }
        self.core().abort_signal().set();
        tree::run_abort_hooks(self);
        Ok(())
    }

    /// Blocks until the current execution (if any) is over.
    fn wait(&self) {
        self.core().done_signal().wait();
    }

    /// Like [`wait`](ActionExt::wait) with a timeout; returns `true` if idle.
    fn wait_timeout(&self, timeout: Duration) -> bool {
        self.core().done_signal().wait_timeout(timeout)
    }

    /// [`abort`](ActionExt::abort) followed by [`wait`](ActionExt::wait).
    fn abort_and_wait(&self) -> Result<(), UsageError> {
        self.abort()?;
        self.wait();
        Ok(())
    }

    /// [`abort`](ActionExt::abort) followed by [`wait_timeout`](ActionExt::wait_timeout).
    fn abort_and_wait_timeout(&self, timeout: Duration) -> Result<bool, UsageError> {
        self.abort()?;
        Ok(self.wait_timeout(timeout))
    }

    /// Set whenever the action is idle.
    fn done_signal(&self) -> Arc<Signal> {
        self.core().done_signal()
    }

    /// The abort signal of the tree the action belongs to.
    fn abort_signal(&self) -> Arc<Signal> {
        self.core().abort_signal()
    }

    /// True once the tree has been asked to abort.
    fn is_aborting(&self) -> bool {
        self.core().abort_signal().is_signaled()
    }

    /// Returns `Err(ActionError::Aborted)` once the tree has been asked to abort.
    fn check_abort(&self) -> Result<(), ActionError> {
        if self.is_aborting() {
            Err(ActionError::Aborted)
        } else {
            Ok(())
        }
    }

    /// Adopts `child`, moving its subtree onto this tree's abort signal.
    fn take_ownership(&self, child: ActionRef) -> Result<(), UsageError> {
        tree::adopt(self, child)
    }

    /// Releases a direct child, giving its subtree a private abort signal.
    fn relinquish_ownership(&self, child: &ActionRef) -> Result<(), UsageError> {
        tree::release(self, child)
    }

    /// Aborts one direct child without aborting this action.
    ///
    /// The child's subtree is moved onto a private signal which is then set; call
    /// [`relink_child_abort`](ActionExt::relink_child_abort) before running it again.
    fn abort_child(&self, child: &ActionRef) -> Result<(), UsageError> {
        tree::abort_child(self, child)
    }

    /// Moves a direct child onto a private, unsignaled abort signal.
    fn detach_child_abort(&self, child: &ActionRef) -> Result<(), UsageError> {
        tree::detach_child_abort(self, child)
    }

    /// Moves a direct child back onto this tree's abort signal.
    fn relink_child_abort(&self, child: &ActionRef) -> Result<(), UsageError> {
        tree::relink_child_abort(self, child)
    }
}

impl<A: Action + ?Sized> ActionExt for A {}
