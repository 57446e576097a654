//! Per-call cancellation and deadline handling.
//!
//! [`CallContext`] pairs a [`CancellationToken`] with an optional deadline.
//! Every repository operation takes one and races its storage work against
//! it, so a cancelled or expired context aborts the call with a
//! cancellation-kind [`AdvSuggestError`] instead of waiting on storage.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AdvSuggestError;

#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context cancelled when `token` is.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Copy of this context that also expires after `timeout`.
    ///
    /// An earlier existing deadline wins.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Copy of this context that also expires at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self {
            token: self.token.clone(),
            deadline: Some(deadline),
        }
    }

    /// Child context: cancelled with its parent, cancellable on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the token fired or the deadline passed.
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail fast with the matching error if the context is already done.
    pub fn check(&self, operation: &'static str) -> Result<(), AdvSuggestError> {
        if self.token.is_cancelled() {
            return Err(AdvSuggestError::canceled(operation));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(AdvSuggestError::deadline_exceeded(operation));
        }
        Ok(())
    }

    /// Resolves when the context is done, yielding the error to report.
    pub async fn done(&self, operation: &'static str) -> AdvSuggestError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => AdvSuggestError::canceled(operation),
                _ = tokio::time::sleep_until(deadline) => AdvSuggestError::deadline_exceeded(operation),
            },
            None => {
                self.token.cancelled().await;
                AdvSuggestError::canceled(operation)
            }
        }
    }

    /// Drive `fut` to completion unless the context finishes first.
    ///
    /// The future is dropped on cancellation, which releases whatever storage
    /// resources it holds.
    pub async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T, AdvSuggestError>
    where
        F: Future<Output = Result<T, AdvSuggestError>>,
    {
        self.check(operation)?;
        tokio::select! {
            biased;
            err = self.done(operation) => {
                tracing::debug!(operation, error = %err, "Call aborted by context");
                Err(err)
            }
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn background_runs_to_completion() {
        let ctx = CallContext::background();
        let out = ctx.run("op", async { Ok::<_, AdvSuggestError>(7) }).await;
        assert_eq!(out.unwrap(), 7);
        assert!(!ctx.is_done());
    }

    #[tokio::test]
    async fn cancelled_context_fails_before_polling() {
        let ctx = CallContext::background();
        ctx.cancel();
        let polled = std::sync::atomic::AtomicBool::new(false);
        let out = ctx
            .run("op", async {
                polled.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, AdvSuggestError>(())
            })
            .await;
        assert_matches!(out, Err(AdvSuggestError::Canceled { operation: "op" }));
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancellation_aborts_pending_work() {
        let ctx = CallContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let out = ctx
            .run("op", std::future::pending::<Result<(), AdvSuggestError>>())
            .await;
        assert_matches!(out, Err(AdvSuggestError::Canceled { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let ctx = CallContext::background().with_timeout(Duration::from_secs(5));
        let out = ctx
            .run("op", std::future::pending::<Result<(), AdvSuggestError>>())
            .await;
        assert_matches!(out, Err(AdvSuggestError::DeadlineExceeded { operation: "op" }));
        assert!(ctx.is_done());
    }

    #[tokio::test]
    async fn child_follows_parent() {
        let parent = CallContext::background();
        let child = parent.child();
        parent.cancel();
        assert!(child.is_done());
        assert_matches!(child.check("op"), Err(AdvSuggestError::Canceled { .. }));
    }

    #[tokio::test]
    async fn earlier_deadline_wins() {
        let short = CallContext::background().with_timeout(Duration::from_secs(1));
        let longer = short.with_timeout(Duration::from_secs(60));
        assert_eq!(short.deadline(), longer.deadline());
    }
}
