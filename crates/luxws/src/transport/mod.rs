//! Frame transport: one WebSocket connection, one request at a time.
//!
//! - [`Transport`] owns the connection and its background receive loop.
//! - [`CallContext`] bounds each call with cancellation and a deadline.
//! - [`Decision`] is what a caller's frame function returns for each frame.
//! - [`FrameTransport`] is the seam the protocol client is written against,
//!   so tests can substitute a scripted transport.

pub mod connection;
pub mod context;
pub mod correlator;
pub mod error;
mod frame;
mod handshake;

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

pub use connection::{Transport, SUBPROTOCOL};
pub use context::CallContext;
pub use correlator::Decision;
pub use error::{RoundTripError, TransportError};

/// Request/response primitive used by [`crate::Client`].
#[async_trait]
pub trait FrameTransport: Send + Sync {
    /// Sends `request` as one text frame, then feeds every inbound text
    /// message to `on_frame`, as raw bytes, until it accepts one or fails.
    ///
    /// # Errors
    ///
    /// - [`RoundTripError::Frame`] with the error `on_frame` returned.
    /// - [`RoundTripError::Transport`] if the connection is closed or busy,
    ///   the frame could not be written, the receive loop ended, or `ctx`
    ///   ended first.
    async fn round_trip<T, E, F>(
        &self,
        ctx: &CallContext,
        request: &str,
        on_frame: F,
    ) -> Result<T, RoundTripError<E>>
    where
        F: FnMut(&[u8]) -> Result<Decision<T>, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static;

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if it was already closed.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Locks `mutex`, recovering the data if a previous holder panicked.
///
/// None of the guarded state can be left half-updated by a panic, so
/// poisoning carries no information here.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
