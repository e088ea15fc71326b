use std::sync::Arc;

use crate::error::{ActionError, UsageError};
use crate::signals::Signal;

use super::action::{Action, ActionExt, ActionRef};

/// View of the running action handed to action bodies.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    action: &'a dyn Action,
}

impl<'a> Context<'a> {
    pub(crate) fn new(action: &'a dyn Action) -> Self {
        Self { action }
    }

    /// The running action.
    pub fn action(&self) -> &'a dyn Action {
        self.action
    }

    /// Shared handle to the running action.
    pub fn this(&self) -> Result<ActionRef, UsageError> {
        self.action.core().this().ok_or_else(|| UsageError::Unbound {
            action: self.action.name().to_string(),
        })
    }

    /// Id of the running action.
    pub fn id(&self) -> u64 {
        self.action.id()
    }

    /// See [`ActionExt::description`].
    pub fn description(&self) -> String {
        self.action.description()
    }

    /// See [`ActionExt::check_abort`].
    pub fn check_abort(&self) -> Result<(), ActionError> {
        self.action.check_abort()
    }

    /// See [`ActionExt::is_aborting`].
    pub fn is_aborting(&self) -> bool {
        self.action.is_aborting()
    }

    /// The abort signal of the running action's tree.
    pub fn abort_signal(&self) -> Arc<Signal> {
        self.action.abort_signal()
    }

    /// Set when the running action is moved onto another abort signal.
    pub(crate) fn relinked_signal(&self) -> Arc<Signal> {
        self.action.core().relinked_signal()
    }
}
