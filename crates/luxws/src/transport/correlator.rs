//! Response correlator: one outstanding request, one terminal outcome.
//!
//! The receive loop hands every inbound text frame to the registered
//! [`FrameHandler`].  A [`Correlator`] runs the caller's decision function on
//! each frame until that function either accepts one or fails; the first
//! such outcome is latched and sent over a one-shot channel.  Frames that
//! arrive after the latch are dropped.

use std::sync::Mutex;

use tokio::sync::oneshot;

use super::lock;

/// Verdict of a frame decision function on one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<T> {
    /// The frame answers the request.
    Accept(T),
    /// The frame is unrelated; keep waiting.
    Ignore,
}

/// Receiver of inbound frames, as seen by the receive loop.
pub(crate) trait FrameHandler: Send + Sync {
    fn handle(&self, payload: &[u8]);
}

/// One-shot latch for a single round trip.
pub(crate) struct Correlator<F, T, E> {
    on_frame: Mutex<F>,
    outcome: Mutex<Option<oneshot::Sender<Result<T, E>>>>,
}

impl<F, T, E> Correlator<F, T, E>
where
    F: FnMut(&[u8]) -> Result<Decision<T>, E>,
{
    /// Creates the latch and the receiver its outcome is delivered on.
    pub(crate) fn new(on_frame: F) -> (Self, oneshot::Receiver<Result<T, E>>) {
        let (tx, rx) = oneshot::channel();
        let correlator = Self {
            on_frame: Mutex::new(on_frame),
            outcome: Mutex::new(Some(tx)),
        };
        (correlator, rx)
    }

    fn is_latched(&self) -> bool {
        lock(&self.outcome).is_none()
    }
}

impl<F, T, E> FrameHandler for Correlator<F, T, E>
where
    F: FnMut(&[u8]) -> Result<Decision<T>, E> + Send,
    T: Send,
    E: Send,
{
    fn handle(&self, payload: &[u8]) {
        if self.is_latched() {
            return;
        }

        // The decision function runs without the outcome lock held.
        let decision = {
            let mut on_frame = lock(&self.on_frame);
            (*on_frame)(payload)
        };

        let outcome = match decision {
            Ok(Decision::Ignore) => return,
            Ok(Decision::Accept(value)) => Ok(value),
            Err(err) => Err(err),
        };

        if let Some(tx) = lock(&self.outcome).take() {
            // The waiting round trip may have given up already.
            let _ = tx.send(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn by_prefix(payload: &[u8]) -> Result<Decision<String>, String> {
        let text = String::from_utf8_lossy(payload).into_owned();
        if text.starts_with("ignore") {
            Ok(Decision::Ignore)
        } else if text.starts_with("error") {
            Err(text)
        } else {
            Ok(Decision::Accept(text))
        }
    }

    #[test]
    fn test_ignored_frames_leave_correlator_open() {
        // Arrange
        let (correlator, mut rx) = Correlator::new(by_prefix);

        // Act
        correlator.handle(b"ignore 1");
        correlator.handle(b"ignore 2");

        // Assert
        assert!(rx.try_recv().is_err());
        assert!(!correlator.is_latched());
    }

    #[test]
    fn test_first_accepted_frame_wins() {
        // Arrange
        let (correlator, mut rx) = Correlator::new(by_prefix);

        // Act
        correlator.handle(b"ignore");
        correlator.handle(b"response");
        correlator.handle(b"late");

        // Assert
        assert_eq!(rx.try_recv().unwrap(), Ok("response".to_string()));
    }

    #[test]
    fn test_error_latches_and_later_frames_are_not_decided() {
        // Arrange: count calls to prove frames after the latch are dropped
        let mut calls = 0;
        let (correlator, mut rx) = Correlator::new(move |payload: &[u8]| {
            calls += 1;
            assert_eq!(calls, 1, "decision function called after latch");
            by_prefix(payload)
        });

        // Act
        correlator.handle(b"error: bad frame");
        correlator.handle(b"response");

        // Assert
        assert_eq!(rx.try_recv().unwrap(), Err("error: bad frame".to_string()));
    }

    #[test]
    fn test_outcome_after_receiver_dropped_is_discarded() {
        let (correlator, rx) = Correlator::new(by_prefix);
        drop(rx);

        correlator.handle(b"response");

        assert!(correlator.is_latched());
    }
}
