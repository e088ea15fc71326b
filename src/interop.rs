//! # Awaiting actions from tokio.
//!
//! Actions complete on their own threads; these helpers bridge a completion into a
//! future through a `tokio::sync::oneshot` channel, so async code can `.await` an
//! action without blocking a runtime worker.
//!
//! ```text
//! execute(action) ──► async_execute(listener) ──► oneshot::Receiver.await ──► Result
//!                                   └── listener(outcome) ──► oneshot::Sender.send
//! ```
//!
//! [`execute_until_cancelled`] additionally aborts the action when a
//! [`CancellationToken`] fires and then waits for it to wind down.

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::actions::{Action, ActionExt, Outcome};
use crate::error::{ActionError, UsageError};

/// Runs `action` and resolves to its result.
pub async fn execute<A>(action: &A) -> Result<(), ActionError>
where
    A: Action + ?Sized,
{
    let rx = launch(action)?;
    settle(rx.await)
}

/// Runs `action`; aborts it if `token` is cancelled first.
///
/// Resolves once the action is over, so on cancellation the result is usually
/// `Err(ActionError::Aborted)`. Only roots can be aborted, so owned actions are
/// rejected up front.
pub async fn execute_until_cancelled<A>(
    action: &A,
    token: CancellationToken,
) -> Result<(), ActionError>
where
    A: Action + ?Sized,
{
    if action.core().has_owner() {
        return Err(UsageError::NotRoot {
            action: action.description(),
        }
        .into());
    }

    let mut rx = launch(action)?;
    tokio::select! {
        outcome = &mut rx => return settle(outcome),
        _ = token.cancelled() => {
            tracing::debug!(action = %action.description(), "cancelled, aborting");
            action.abort()?;
        }
    }
    settle(rx.await)
}

fn launch<A>(action: &A) -> Result<oneshot::Receiver<Outcome>, ActionError>
where
    A: Action + ?Sized,
{
    let (tx, rx) = oneshot::channel();
    action.async_execute(move |outcome: Outcome| {
        let _ = tx.send(outcome);
    })?;
    Ok(rx)
}

fn settle(received: Result<Outcome, oneshot::error::RecvError>) -> Result<(), ActionError> {
    match received {
        Ok(outcome) => outcome.into_result(),
        Err(_) => Err(ActionError::msg("action finished without reporting an outcome")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::actions::{ActionFn, ActionRef};
    use crate::wrappers::Pause;

    #[tokio::test]
    async fn test_execute_resolves_to_result() {
        let ok = ActionFn::arc("ok", |_| Ok(()));
        assert!(execute(&*ok).await.is_ok());

        let failing = ActionFn::arc("failing", |_| Err(ActionError::msg("boom")));
        let err = execute(&*failing).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(failing.done_signal().is_signaled());
    }

    #[tokio::test]
    async fn test_cancellation_aborts_action() {
        let pause = Pause::new(Duration::from_secs(3600));
        let token = CancellationToken::new();

        let t = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            t.cancel();
        });

        let err = execute_until_cancelled(&*pause, token).await.unwrap_err();
        assert!(err.is_aborted());
        assert!(pause.abort_signal().is_signaled());
    }

    #[tokio::test]
    async fn test_uncancelled_action_completes() {
        let pause = Pause::new(Duration::from_millis(5));
        let result = execute_until_cancelled(&*pause, CancellationToken::new()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_owned_action_is_rejected() {
        let owner = ActionFn::arc("owner", |_| Ok(()));
        let child: ActionRef = ActionFn::arc("child", |_| Ok(()));
        owner.take_ownership(Arc::clone(&child)).unwrap();

        let err = execute_until_cancelled(&*child, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err.as_usage(), Some(UsageError::NotRoot { .. })));
    }
}
