//! # AbortLinked: a root that also listens to another action's abort.
//!
//! [`AbortLinked`] owns one inner action and watches a second action it does not own.
//! It lets a composite abort one child (the wrapper is a root, so it can be aborted on
//! its own) while the child still reacts when the watched action is aborted.
//!
//! ```text
//! run: inner.async_execute ─► wait any [inner done, watched abort, watched rewired]
//!        inner done      ─► return inner result
//!        watched abort   ─► abort inner in place ─► wait inner ─► relink ─► return result
//!        watched rewired ─► fetch the watched abort signal again, keep waiting
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::actions::{Action, ActionExt, ActionRef, Context, Outcome, SyncAction, SyncBody};
use crate::error::{ActionError, UsageError};
use crate::signals::WaitGroup;

/// Root-only wrapper linking an inner action to a watched action's abort signal.
pub struct AbortLinked {
    inner: ActionRef,
    watched: Mutex<Option<Weak<dyn Action>>>,
}

impl AbortLinked {
    /// Wraps `inner` (taking ownership of it) and links it to `watched`.
    pub fn new(inner: ActionRef, watched: &ActionRef) -> Result<Arc<SyncAction<Self>>, UsageError> {
        let linked = Self::unlinked(inner)?;
        linked.link_to(watched);
        Ok(linked)
    }

    /// Wraps `inner` without a watched action yet; see [`link_to`](Self::link_to).
    pub fn unlinked(inner: ActionRef) -> Result<Arc<SyncAction<Self>>, UsageError> {
        let linked = SyncAction::new(Self {
            inner: Arc::clone(&inner),
            watched: Mutex::new(None),
        });
        linked.take_ownership(inner)?;
        Ok(linked)
    }

    /// Sets the watched action. Only a weak reference is kept.
    pub fn link_to(&self, watched: &ActionRef) {
        *self.watched.lock() = Some(Arc::downgrade(watched));
    }

    /// The wrapped action.
    pub fn inner(&self) -> &ActionRef {
        &self.inner
    }

    fn watched(&self) -> Option<ActionRef> {
        self.watched.lock().as_ref().and_then(Weak::upgrade)
    }
}

impl SyncBody for AbortLinked {
    fn name(&self) -> &str {
        "AbortLinked"
    }

    fn must_be_root(&self) -> bool {
        true
    }

    fn linked_parent(&self) -> Option<ActionRef> {
        self.watched()
    }

    fn run(&self, cx: &Context<'_>) -> Result<(), ActionError> {
        let slot = Arc::new(Mutex::new(None));
        let s = Arc::clone(&slot);
        self.inner
            .async_execute(move |outcome: Outcome| *s.lock() = Some(outcome))?;

        if let Some(watched) = self.watched() {
            loop {
                let rewired = watched.core().relinked_signal();
                rewired.reset();

                let group = WaitGroup::from_signals([
                    self.inner.done_signal(),
                    watched.abort_signal(),
                    rewired,
                ]);
                match group.wait_for_any() {
                    Some(1) => {
                        let owner = cx.action();
                        owner.abort_child(&self.inner)?;
                        self.inner.wait();
                        owner.relink_child_abort(&self.inner)?;
                        break;
                    }
                    Some(2) => continue,
                    _ => break,
                }
            }
        }

        self.inner.wait();
        let outcome = slot.lock().take();
        outcome.map_or(Ok(()), Outcome::into_result)
    }
}
