//! Per-call cancellation and deadlines.
//!
//! A [`CallContext`] bounds one operation (connect, round trip) the way a
//! request context does in a server: it can be cancelled from another task,
//! carry a deadline, or both.  Ending a context only fails the call that is
//! waiting on it; the connection itself stays usable.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::TransportError;

/// Cancellation signal plus optional deadline for one or more calls.
///
/// Cloning a context shares its cancellation state.
///
/// # Example
///
/// ```rust
/// use luxws::CallContext;
/// use std::time::Duration;
///
/// let ctx = CallContext::with_timeout(Duration::from_secs(5));
/// assert!(ctx.err().is_none());
///
/// ctx.cancel();
/// assert!(ctx.err().is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that never ends on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Wraps an existing token, e.g. one tied to process shutdown.
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Derives a context that also ends when `self` ends, and additionally
    /// expires after `timeout`, whichever comes first.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            cancel: self.cancel.child_token(),
            deadline: Some(self.deadline.map_or(deadline, |own| own.min(deadline))),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels this context and every context derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The reason this context has ended, or `None` while it is live.
    pub fn err(&self) -> Option<TransportError> {
        if self.cancel.is_cancelled() {
            return Some(TransportError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(TransportError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context ends, yielding the reason.
    pub async fn done(&self) -> TransportError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => TransportError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => TransportError::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                TransportError::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_done_reports_cancellation() {
        // Arrange
        let ctx = CallContext::new();
        let remote = ctx.clone();

        // Act
        tokio::spawn(async move { remote.cancel() });
        let reason = ctx.done().await;

        // Assert
        assert!(matches!(reason, TransportError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_reports_deadline() {
        let ctx = CallContext::with_timeout(Duration::from_secs(3));
        let reason = ctx.done().await;
        assert!(matches!(reason, TransportError::DeadlineExceeded));
        assert!(matches!(ctx.err(), Some(TransportError::DeadlineExceeded)));
    }

    #[test]
    fn test_cancelling_parent_ends_child() {
        let parent = CallContext::new();
        let child = parent.child_with_timeout(Duration::from_secs(60));

        parent.cancel();

        assert!(matches!(child.err(), Some(TransportError::Cancelled)));
    }

    #[tokio::test]
    async fn test_child_keeps_earlier_parent_deadline() {
        let parent = CallContext::with_timeout(Duration::from_millis(10));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }
}
