//! # Sequence: run children one after another.
//!
//! [`Sequence`] owns its children and runs them in insertion order, stopping at the
//! first error, which it reports verbatim.
//!
//! ## Execution paths
//! ```text
//! blocking:  for each child: check abort ─► child.sync_execute()?
//!
//! callback:  launch child[0] ──► on finish ─┬─► error / last ───────► complete
//!                                           ├─► natively sync child ─► run inline, loop
//!                                           └─► async child ─────────► launch, return
//! complete:  once every child's done signal is set ─► completion.deliver(result)
//! ```
//!
//! An empty sequence succeeds; on the callback path the result is delivered from a
//! fresh thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::actions::{Action, ActionCore, ActionExt, ActionRef, Completion, Outcome, bind};
use crate::error::{ActionError, Panicked, UsageError};
use crate::signals::{Signal, on_all_set};

/// Composite running its children sequentially.
pub struct Sequence {
    core: ActionCore,
    children: Mutex<Vec<ActionRef>>,
}

impl Sequence {
    /// Creates an empty sequence.
    pub fn new() -> Arc<Self> {
        bind(Self {
            core: ActionCore::new(),
            children: Mutex::new(Vec::new()),
        })
    }

    /// Creates a sequence over `actions`, in order.
    pub fn from_actions<I>(actions: I) -> Result<Arc<Self>, UsageError>
    where
        I: IntoIterator<Item = ActionRef>,
    {
        let seq = Self::new();
        for action in actions {
            seq.add(action)?;
        }
        Ok(seq)
    }

    /// Appends a child, taking ownership of it.
    pub fn add(&self, action: ActionRef) -> Result<(), UsageError> {
        self.take_ownership(Arc::clone(&action))?;
        self.children.lock().push(action);
        Ok(())
    }

    /// Releases every child.
    pub fn clear(&self) -> Result<(), UsageError> {
        let children = std::mem::take(&mut *self.children.lock());
        for child in &children {
            self.relinquish_ownership(child)?;
        }
        Ok(())
    }

    /// The children, in execution order.
    pub fn actions(&self) -> Vec<ActionRef> {
        self.children.lock().clone()
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.children.lock().len()
    }

    /// True if the sequence has no children.
    pub fn is_empty(&self) -> bool {
        self.children.lock().is_empty()
    }
}

impl Action for Sequence {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn name(&self) -> &str {
        "Sequence"
    }

    fn extended_description(&self) -> String {
        format!("Number of actions: {}", self.len())
    }

    fn is_naturally_synchronous(&self) -> bool {
        true
    }

    fn execute_blocking(&self) -> Result<(), ActionError> {
        for step in self.actions() {
            self.check_abort()?;
            step.sync_execute()?;
        }
        Ok(())
    }

    fn execute_callback(&self, completion: Completion) -> Result<(), ActionError> {
        let steps = self.actions();
        if steps.is_empty() {
            completion.deliver(Ok(()));
            return Ok(());
        }

        let owner = self.core.this().ok_or_else(|| UsageError::Unbound {
            action: self.name().to_string(),
        })?;
        let run = Arc::new(Run {
            owner,
            steps,
            completion: Mutex::new(Some(completion)),
        });

        if let Err(err) = run.launch(0) {
            if let Some(completion) = run.completion.lock().take() {
                completion.disarm();
            }
            return Err(err);
        }
        Ok(())
    }
}

/// State of one callback-path execution.
struct Run {
    owner: ActionRef,
    steps: Vec<ActionRef>,
    completion: Mutex<Option<Completion>>,
}

impl Run {
    fn launch(self: &Arc<Self>, index: usize) -> Result<(), ActionError> {
        let run = Arc::clone(self);
        self.steps[index].async_execute(move |outcome: Outcome| {
            run.advance(index + 1, outcome.into_result());
        })
    }

    fn advance(self: &Arc<Self>, mut index: usize, mut result: Result<(), ActionError>) {
        loop {
            if result.is_err() || index == self.steps.len() {
                self.complete(result);
                return;
            }
            if let Err(err) = self.owner.check_abort() {
                self.complete(Err(err));
                return;
            }

            let step = &self.steps[index];
            if step.is_naturally_synchronous() {
                result = panic::catch_unwind(AssertUnwindSafe(|| step.sync_execute())).unwrap_or_else(
                    |payload| Err(ActionError::failed(Panicked::from_payload(payload.as_ref()))),
                );
                index += 1;
            } else {
                match self.launch(index) {
                    Ok(()) => return,
                    Err(err) => result = Err(err),
                }
            }
        }
    }

    fn complete(&self, result: Result<(), ActionError>) {
        let Some(completion) = self.completion.lock().take() else {
            return;
        };
        let done: Vec<Arc<Signal>> = self.steps.iter().map(|s| s.done_signal()).collect();
        on_all_set(&done, move || completion.deliver(result));
    }
}
