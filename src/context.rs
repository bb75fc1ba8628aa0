use std::future::Future;

use tokio::{
    select,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Cancellation and deadline carrier handed to every handler attempt.
///
/// The publisher chooses the context passed to [`EventBus::publish`]; the
/// handler sees it on its first attempt only. Retries run under
/// [`Context::background`], so a cancelled or expired publish context does not
/// stop the bus from retrying.
///
/// The bus itself never enforces the context. Handlers that want a timeout
/// should check it with [`check`](Context::check), race work against it with
/// [`run`](Context::run), or await [`done`](Context::done).
///
/// ```rust
/// use topicbus::Context;
/// use tokio::time::Duration;
///
/// let ctx = Context::background().with_timeout(Duration::from_secs(5));
/// assert!(ctx.deadline().is_some());
/// assert!(ctx.check().is_ok());
/// ```
///
/// [`EventBus::publish`]: crate::EventBus::publish
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel_token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled by the bus and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context cancelled together with `token`.
    pub fn with_cancel(token: CancellationToken) -> Self {
        Self {
            cancel_token: token,
            deadline: None,
        }
    }

    /// Set a deadline. An earlier deadline already present is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Set a deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context that is cancelled when this one is, but can also be
    /// cancelled on its own without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            cancel_token: self.cancel_token.child_token(),
            deadline: self.deadline,
        }
    }

    #[inline]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context (and every child derived from it).
    #[inline]
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Returns `Err` once the context is cancelled or past its deadline.
    pub fn check(&self) -> Result<()> {
        if self.cancel_token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Error::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Completes when the context is cancelled or its deadline passes,
    /// yielding the reason. Never completes for a background context.
    pub async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => select! {
                biased;
                _ = self.cancel_token.cancelled() => Error::Cancelled,
                _ = tokio::time::sleep_until(deadline) => Error::DeadlineExceeded,
            },
            None => {
                self.cancel_token.cancelled().await;
                Error::Cancelled
            }
        }
    }

    /// Drive `fut` to completion unless the context finishes first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output> {
        select! {
            biased;
            err = self.done() => Err(err),
            out = fut => Ok(out),
        }
    }
}
