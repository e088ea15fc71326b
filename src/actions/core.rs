//! # Per-action state: identity, ownership links, signals and the re-entrancy counter.
//!
//! Every concrete action embeds one [`ActionCore`] and hands it out through
//! [`Action::core`]. The core never runs anything itself; it keeps the bookkeeping the
//! execution entry points in [`ActionExt`](super::ActionExt) rely on.
//!
//! ## Ownership tree
//! ```text
//!            root (abort: A)
//!           /              \
//!     child (abort: A)   child (abort: A)
//!          |
//!     grandchild (abort: A)
//! ```
//! - The owner link is a `Weak`; children are held strongly by their owner.
//! - Every member of a tree shares the root's abort signal. Adoption and release
//!   rewire the moved subtree onto the new signal, one node at a time, never holding
//!   two node locks at once.
//! - Each rewire also sets the node's `relinked` signal, so a blocked wait can notice
//!   that the abort signal it snapshotted is no longer current.
//!
//! ## Lifecycle
//! ```text
//! begin:  wait done ─► reset done ─► reset abort (roots only) ─► executing += 1 ─► starting
//! finish: executing -= 1 ─► (at zero) finished ─► listener ─► set done
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::error::{ActionError, UsageError};
use crate::monitors;
use crate::signals::Signal;

use super::action::{Action, ActionExt, ActionRef};
use super::listener::{Listener, Outcome, notify};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

struct Links {
    owner: Option<Weak<dyn Action>>,
    children: BTreeMap<u64, ActionRef>,
    abort: Arc<Signal>,
}

impl Links {
    fn has_owner(&self) -> bool {
        self.owner.as_ref().is_some_and(|o| o.strong_count() > 0)
    }
}

/// Bookkeeping shared by every action.
pub struct ActionCore {
    id: u64,
    this: OnceLock<Weak<dyn Action>>,
    links: Mutex<Links>,
    done: Arc<Signal>,
    relinked: Arc<Signal>,
    executing: AtomicUsize,
}

impl ActionCore {
    /// Creates a core with a fresh id, a private abort signal and a set done signal.
    pub fn new() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            this: OnceLock::new(),
            links: Mutex::new(Links {
                owner: None,
                children: BTreeMap::new(),
                abort: Signal::new(),
            }),
            done: Signal::new_signaled(),
            relinked: Signal::new(),
            executing: AtomicUsize::new(0),
        }
    }

    /// Process-wide unique id, increasing in construction order.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Shared handle to the action embedding this core, if it was bound.
    pub fn this(&self) -> Option<ActionRef> {
        self.this.get().and_then(Weak::upgrade)
    }

    pub(crate) fn weak(&self) -> Option<Weak<dyn Action>> {
        self.this.get().cloned()
    }

    /// The owning action, if any.
    pub fn owner(&self) -> Option<ActionRef> {
        self.links.lock().owner.as_ref().and_then(Weak::upgrade)
    }

    /// True if the action is owned.
    pub fn has_owner(&self) -> bool {
        self.links.lock().has_owner()
    }

    /// Directly owned children, in adoption order.
    pub fn children(&self) -> Vec<ActionRef> {
        self.links.lock().children.values().cloned().collect()
    }

    fn owns(&self, child: &ActionRef) -> bool {
        self.links.lock().children.contains_key(&child.id())
    }

    /// The abort signal of the tree this action currently belongs to.
    pub fn abort_signal(&self) -> Arc<Signal> {
        Arc::clone(&self.links.lock().abort)
    }

    /// Set whenever no execution is in flight.
    pub fn done_signal(&self) -> Arc<Signal> {
        Arc::clone(&self.done)
    }

    pub(crate) fn relinked_signal(&self) -> Arc<Signal> {
        Arc::clone(&self.relinked)
    }

    /// True while at least one execution unit is in flight.
    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst) > 0
    }

    /// Opens an execution and returns the shared handle of the action.
    pub(crate) fn begin<A: Action + ?Sized>(action: &A) -> Result<ActionRef, UsageError> {
        let core = action.core();
        let this = core.this().ok_or_else(|| UsageError::Unbound {
            action: action.name().to_string(),
        })?;

        core.done.wait();
        core.done.reset();

        let (is_root, abort) = {
            let links = core.links.lock();
            (!links.has_owner(), Arc::clone(&links.abort))
        };
        if is_root {
            abort.reset();
        }

        core.executing.fetch_add(1, Ordering::SeqCst);
        monitors::notify_starting(&*this);
        Ok(this)
    }

    /// Closes one execution unit; the last one notifies and sets the done signal.
    pub(crate) fn finish(
        &self,
        action: &dyn Action,
        result: &Result<(), ActionError>,
        listener: Option<Box<dyn Listener>>,
    ) -> Result<(), UsageError> {
        let previous = self
            .executing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map_err(|_| UsageError::IdleDecrement {
                action: action.description(),
            })?;

        if previous == 1 {
            monitors::notify_finished(action, result.as_ref().err());
            if let Some(listener) = listener {
                notify(listener, Outcome::from_result(result.clone()));
            }
            self.done.set();
        }
        Ok(())
    }
}

impl Default for ActionCore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ActionCore {
    fn drop(&mut self) {
        self.done.wait();
    }
}

impl fmt::Debug for ActionCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCore")
            .field("id", &self.id)
            .field("executing", &self.executing.load(Ordering::SeqCst))
            .field("done", &self.done.is_signaled())
            .finish()
    }
}

/// Moves a freshly constructed action behind an `Arc` and binds its core to it.
///
/// Every factory in this crate goes through `bind`; custom [`Action`] implementations
/// must do the same before executing or adopting anything.
pub fn bind<A: Action>(action: A) -> Arc<A> {
    let action = Arc::new(action);
    let as_dyn: Arc<dyn Action> = action.clone();
    let _ = action.core().this.set(Arc::downgrade(&as_dyn));
    action
}

pub(crate) fn adopt<O: Action + ?Sized>(owner: &O, child: ActionRef) -> Result<(), UsageError> {
    if child.must_be_root() {
        return Err(UsageError::RootOnly {
            action: child.description(),
        });
    }

    let mut cycle = owner.id() == child.id();
    let mut ancestor = owner.parent();
    while let Some(current) = ancestor.take() {
        if current.id() == child.id() {
            cycle = true;
            break;
        }
        ancestor = current.parent();
    }
    if cycle {
        return Err(UsageError::OwnershipCycle {
            owner: owner.description(),
            child: child.description(),
        });
    }

    let owner_weak = owner.core().weak().ok_or_else(|| UsageError::Unbound {
        action: owner.name().to_string(),
    })?;

    let claimed = {
        let mut links = child.core().links.lock();
        if links.has_owner() {
            false
        } else {
            links.owner = Some(owner_weak);
            true
        }
    };
    if !claimed {
        return Err(UsageError::AlreadyOwned {
            action: child.description(),
        });
    }

    let abort = {
        let mut links = owner.core().links.lock();
        links.children.insert(child.id(), Arc::clone(&child));
        Arc::clone(&links.abort)
    };
    rewire(&*child, &abort);
    Ok(())
}

pub(crate) fn release<O: Action + ?Sized>(owner: &O, child: &ActionRef) -> Result<(), UsageError> {
    let removed = owner.core().links.lock().children.remove(&child.id());
    if removed.is_none() {
        return Err(not_owned(owner, child));
    }

    child.core().links.lock().owner = None;
    rewire(&**child, &Signal::new());
    Ok(())
}

pub(crate) fn abort_child<O: Action + ?Sized>(owner: &O, child: &ActionRef) -> Result<(), UsageError> {
    if !owner.core().owns(child) {
        return Err(not_owned(owner, child));
    }

    let private = Signal::new();
    rewire(&**child, &private);
    private.set();
    run_abort_hooks(&**child);
    Ok(())
}

pub(crate) fn detach_child_abort<O: Action + ?Sized>(
    owner: &O,
    child: &ActionRef,
) -> Result<(), UsageError> {
    if !owner.core().owns(child) {
        return Err(not_owned(owner, child));
    }
    rewire(&**child, &Signal::new());
    Ok(())
}

pub(crate) fn relink_child_abort<O: Action + ?Sized>(
    owner: &O,
    child: &ActionRef,
) -> Result<(), UsageError> {
    if !owner.core().owns(child) {
        return Err(not_owned(owner, child));
    }
    rewire(&**child, &owner.core().abort_signal());
    Ok(())
}

/// Runs `on_abort` on every descendant, then on the action itself.
pub(crate) fn run_abort_hooks<A: Action + ?Sized>(action: &A) {
    for child in action.core().children() {
        run_abort_hooks(&*child);
    }
    action.on_abort();
}

fn rewire<A: Action + ?Sized>(action: &A, signal: &Arc<Signal>) {
    let children: Vec<ActionRef> = {
        let mut links = action.core().links.lock();
        links.abort = Arc::clone(signal);
        links.children.values().cloned().collect()
    };
    action.core().relinked.set();
    for child in &children {
        rewire(&**child, signal);
    }
}

fn not_owned<O: Action + ?Sized>(owner: &O, child: &ActionRef) -> UsageError {
    UsageError::NotOwned {
        owner: owner.description(),
        child: child.description(),
    }
}
