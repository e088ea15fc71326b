//! # Variable: a slot whose action can be swapped between executions.
//!
//! [`Variable`] owns at most one action and forwards both execution forms to it. An
//! empty slot succeeds immediately. Swapping while an execution is in flight is allowed;
//! the running execution keeps the action it started with.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::actions::{Action, ActionCore, ActionExt, ActionRef, Completion, Outcome, bind};
use crate::error::{ActionError, UsageError};
use crate::signals::on_all_set;

/// Swappable holder action.
pub struct Variable {
    core: ActionCore,
    current: Mutex<Option<ActionRef>>,
}

impl Variable {
    /// Creates an empty holder.
    pub fn new() -> Arc<Self> {
        bind(Self {
            core: ActionCore::new(),
            current: Mutex::new(None),
        })
    }

    /// Replaces the held action, releasing the previous one.
    pub fn set(&self, action: Option<ActionRef>) -> Result<(), UsageError> {
        let mut current = self.current.lock();
        if current.as_ref().map(|a| a.id()) == action.as_ref().map(|a| a.id()) {
            return Ok(());
        }

        if let Some(next) = &action {
            self.take_ownership(Arc::clone(next))?;
        }
        if let Some(previous) = current.take() {
            self.relinquish_ownership(&previous)?;
        }
        *current = action;
        Ok(())
    }

    /// The held action.
    pub fn get(&self) -> Option<ActionRef> {
        self.current.lock().clone()
    }
}

impl Action for Variable {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn name(&self) -> &str {
        "Variable"
    }

    fn is_naturally_synchronous(&self) -> bool {
        self.get().is_none_or(|a| a.is_naturally_synchronous())
    }

    fn execute_blocking(&self) -> Result<(), ActionError> {
        match self.get() {
            Some(action) => action.sync_execute(),
            None => Ok(()),
        }
    }

    fn execute_callback(&self, completion: Completion) -> Result<(), ActionError> {
        let Some(action) = self.get() else {
            completion.deliver(Ok(()));
            return Ok(());
        };

        let slot = Arc::new(Mutex::new(Some(completion)));
        let (s, done) = (Arc::clone(&slot), action.done_signal());
        let launched = action.async_execute(move |outcome: Outcome| {
            if let Some(completion) = s.lock().take() {
                let result = outcome.into_result();
                on_all_set(&[done], move || completion.deliver(result));
            }
        });
        if let Err(err) = launched {
            if let Some(completion) = slot.lock().take() {
                completion.disarm();
            }
            return Err(err);
        }
        Ok(())
    }
}
