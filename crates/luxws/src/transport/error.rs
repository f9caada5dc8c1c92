//! Transport error types.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

/// Errors reported by the frame transport.
///
/// The terminal error of a connection is handed to every caller that touches
/// the connection afterwards, hence `Clone`; WebSocket errors are shared
/// behind an [`Arc`].
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Dialling or the opening handshake failed.
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Arc<WsError>,
    },

    /// The opening handshake did not complete in time.
    #[error("handshake with {url} timed out after {timeout:?}")]
    HandshakeTimeout { url: String, timeout: Duration },

    /// The connection was closed by this side.
    #[error("use of closed network connection")]
    Closed,

    /// Another round trip is already outstanding on this connection.
    #[error("connection is busy")]
    Busy,

    /// The receive loop has ended without a more specific cause.
    #[error("receiver not running")]
    NotRunning,

    /// Reading or writing a frame failed.
    #[error("websocket I/O error: {0}")]
    Io(#[source] Arc<WsError>),

    /// The call context was cancelled.
    #[error("context canceled")]
    Cancelled,

    /// The call context's deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl TransportError {
    pub(crate) fn io(err: WsError) -> Self {
        TransportError::Io(Arc::new(err))
    }

    /// `true` for errors meaning the connection is gone: closed locally,
    /// closed by the peer, or already torn down.
    pub fn is_closed(&self) -> bool {
        match self {
            TransportError::Closed => true,
            TransportError::Io(err) => {
                matches!(**err, WsError::ConnectionClosed | WsError::AlreadyClosed)
            }
            _ => false,
        }
    }

    /// `true` if the call context ended the operation.
    pub fn is_context(&self) -> bool {
        matches!(
            self,
            TransportError::Cancelled | TransportError::DeadlineExceeded
        )
    }
}

/// Failure of a single round trip.
///
/// `E` is the error type of the caller's frame decision function, reported
/// unchanged when that function rejects a frame.
#[derive(Debug, Error)]
pub enum RoundTripError<E> {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Frame(E),
}
