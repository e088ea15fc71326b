//! # Finally: always run a cleanup action.
//!
//! [`Finally`] runs its action, then its cleanup:
//! - after success and after failures, always;
//! - after an abort only when `even_upon_abort` is set. The cleanup is then moved onto
//!   a private abort signal for its run, so the abort that stopped the action does not
//!   stop the cleanup too.
//!
//! The action's error wins over the cleanup's.

use std::sync::Arc;

use crate::actions::{ActionExt, ActionRef, Context, SyncAction, SyncBody};
use crate::error::{ActionError, UsageError};

/// Action-then-cleanup body.
pub struct Finally {
    action: ActionRef,
    cleanup: ActionRef,
    even_upon_abort: bool,
}

impl Finally {
    /// Wraps `action` and `cleanup`, taking ownership of both.
    pub fn new(
        action: ActionRef,
        cleanup: ActionRef,
        even_upon_abort: bool,
    ) -> Result<Arc<SyncAction<Self>>, UsageError> {
        let finally = SyncAction::new(Self {
            action: Arc::clone(&action),
            cleanup: Arc::clone(&cleanup),
            even_upon_abort,
        });
        finally.take_ownership(action)?;
        finally.take_ownership(cleanup)?;
        Ok(finally)
    }
}

impl SyncBody for Finally {
    fn name(&self) -> &str {
        "Finally"
    }

    fn describe(&self) -> String {
        format!("Even upon abort? {}", self.even_upon_abort)
    }

    fn run(&self, cx: &Context<'_>) -> Result<(), ActionError> {
        let result = self.action.sync_execute();
        let aborted = matches!(result, Err(ActionError::Aborted));
        if aborted && !self.even_upon_abort {
            return result;
        }

        let owner = cx.action();
        if aborted {
            owner.detach_child_abort(&self.cleanup)?;
        }
        let cleanup = self.cleanup.sync_execute();
        if aborted {
            owner.relink_child_abort(&self.cleanup)?;
        }

        match (result, cleanup) {
            (Err(err), Err(cleanup_err)) => {
                tracing::warn!(error = %cleanup_err, "cleanup failed after an earlier error");
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
            (Ok(()), cleanup) => cleanup,
        }
    }
}
