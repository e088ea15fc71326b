//! Error types used by actions, composites and the dispatcher.
//!
//! This module defines two enums:
//!
//! - [`ActionError`] is what an execution ends with when it does not succeed.
//! - [`UsageError`] is a broken contract (double ownership, non-root abort, ...).
//!   Usage errors are returned immediately to the caller, never through a listener.
//!
//! Both types provide `as_label` for logs/metrics. Failures keep the original error
//! behind an `Arc`, so a captured error can be handed around, cloned and later
//! inspected with [`ActionError::downcast_ref`] without losing its concrete type.

use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Boxed error accepted by [`ActionError::from_boxed`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Coarse classification of an [`ActionError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The action was aborted.
    Aborted,
    /// A deadline wrapper gave up waiting.
    Timeout,
    /// Any other failure raised by the action body.
    Failed,
    /// A broken usage contract.
    Usage,
}

/// # Why an execution did not succeed.
///
/// `Aborted` is a tag, not a message: code must match on the variant (or call
/// [`ActionError::is_aborted`]) rather than inspect text.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ActionError {
    /// The action (or its tree) was aborted.
    #[error("action aborted")]
    Aborted,

    /// A deadline expired before the wrapped action finished.
    #[error("timed out after waiting {timeout:?} for '{action}' to finish")]
    Timeout {
        /// The deadline that expired.
        timeout: Duration,
        /// Description of the action that was still running.
        action: String,
    },

    /// The action failed; the original error is preserved.
    #[error("{0}")]
    Failed(Arc<dyn StdError + Send + Sync + 'static>),

    /// The action was used in a way its contract forbids.
    #[error(transparent)]
    Usage(#[from] UsageError),
}

impl ActionError {
    /// Wraps any error as a failure.
    pub fn failed<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        ActionError::Failed(Arc::new(error))
    }

    /// Wraps an already boxed error as a failure.
    pub fn from_boxed(error: BoxError) -> Self {
        ActionError::Failed(Arc::from(error))
    }

    /// Builds a failure from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        ActionError::failed(Message(message.into()))
    }

    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::Aborted => ErrorKind::Aborted,
            ActionError::Timeout { .. } => ErrorKind::Timeout,
            ActionError::Failed(_) => ErrorKind::Failed,
            ActionError::Usage(_) => ErrorKind::Usage,
        }
    }

    /// True if this is the distinguished aborted error.
    pub fn is_aborted(&self) -> bool {
        matches!(self, ActionError::Aborted)
    }

    /// Recovers the concrete error captured by [`ActionError::Failed`].
    ///
    /// # Example
    /// ```
    /// use actionvisor::ActionError;
    ///
    /// #[derive(Debug, thiserror::Error)]
    /// #[error("disk full")]
    /// struct DiskFull;
    ///
    /// let captured = ActionError::failed(DiskFull);
    /// let later = captured.clone();
    /// assert!(later.downcast_ref::<DiskFull>().is_some());
    /// ```
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        match self {
            ActionError::Failed(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Returns the usage error, if this is one.
    pub fn as_usage(&self) -> Option<&UsageError> {
        match self {
            ActionError::Usage(usage) => Some(usage),
            _ => None,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ActionError::Aborted => "action_aborted",
            ActionError::Timeout { .. } => "action_timeout",
            ActionError::Failed(_) => "action_failed",
            ActionError::Usage(usage) => usage.as_label(),
        }
    }
}

/// # Broken usage contracts.
///
/// These are raised synchronously by the call that breaks the contract and are
/// never retried.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// The action is already owned by another action.
    #[error("'{action}' already has an owner")]
    AlreadyOwned {
        /// Description of the action that could not be adopted.
        action: String,
    },

    /// The action's type never accepts an owner.
    #[error("'{action}' can only be a root action")]
    RootOnly {
        /// Description of the root-only action.
        action: String,
    },

    /// Adoption would make an action its own ancestor.
    #[error("'{owner}' cannot own '{child}': ownership would form a cycle")]
    OwnershipCycle {
        /// Description of the would-be owner.
        owner: String,
        /// Description of the would-be child.
        child: String,
    },

    /// The action is not a direct child of the owner.
    #[error("'{child}' is not owned by '{owner}'")]
    NotOwned {
        /// Description of the owner.
        owner: String,
        /// Description of the action that is not its child.
        child: String,
    },

    /// Abort was called on an action that has an owner.
    #[error("abort is only valid on root actions; '{action}' has an owner")]
    NotRoot {
        /// Description of the owned action.
        action: String,
    },

    /// A completion arrived for an action that is not executing.
    #[error("'{action}' was told it finished while idle")]
    IdleDecrement {
        /// Description of the idle action.
        action: String,
    },

    /// A listener callback arrived on the thread that started the execution.
    #[error("completion of '{action}' was reported on the thread that started it")]
    SameThreadCallback {
        /// Description of the action.
        action: String,
    },

    /// A completion was dropped without being finished; the execution was closed as failed.
    #[error("completion was dropped without being finished")]
    CompletionDropped,

    /// A dispatcher was configured with an empty pool.
    #[error("dispatcher pool size must be at least 1")]
    ZeroPoolSize,

    /// Only root actions can be dispatched.
    #[error("only root actions can be dispatched; '{action}' has a parent")]
    NotDispatchable {
        /// Description of the rejected action.
        action: String,
    },

    /// The action was not created through a factory and has no shared handle.
    #[error("'{action}' is not bound to a shared handle")]
    Unbound {
        /// Name of the unbound action.
        action: String,
    },

    /// A scheduled time lies in the past and running late was not allowed.
    #[error("'{action}' was scheduled for {at}, which is in the past")]
    ScheduledInPast {
        /// Description of the scheduled action.
        action: String,
        /// The requested time of execution.
        at: String,
    },
}

impl UsageError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            UsageError::AlreadyOwned { .. } => "usage_already_owned",
            UsageError::RootOnly { .. } => "usage_root_only",
            UsageError::OwnershipCycle { .. } => "usage_ownership_cycle",
            UsageError::NotOwned { .. } => "usage_not_owned",
            UsageError::NotRoot { .. } => "usage_not_root",
            UsageError::IdleDecrement { .. } => "usage_idle_decrement",
            UsageError::SameThreadCallback { .. } => "usage_same_thread_callback",
            UsageError::CompletionDropped => "usage_completion_dropped",
            UsageError::ZeroPoolSize => "usage_zero_pool_size",
            UsageError::NotDispatchable { .. } => "usage_not_dispatchable",
            UsageError::Unbound { .. } => "usage_unbound",
            UsageError::ScheduledInPast { .. } => "usage_scheduled_in_past",
        }
    }
}

/// A panic raised by an action body, captured as a failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("action panicked: {message}")]
pub struct Panicked {
    /// The panic payload, if it was a string.
    pub message: String,
}

impl Panicked {
    pub(crate) fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Panicked { message }
    }
}

/// Failure carrying only a message.
#[derive(Error, Debug)]
#[error("{0}")]
struct Message(String);
