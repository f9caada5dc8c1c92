//! The LuxWS WebSocket connection and its receive loop.
//!
//! # Lifecycle
//!
//! ```text
//!  connect() ──► open ──► close() ──► closed
//!                 │
//!                 └──► peer close / read error ──► receive loop ended
//! ```
//!
//! The receive loop is spawned as soon as the connection exists and runs
//! until the connection is closed or a read fails.  It must keep reading even
//! while no request is outstanding: the controller sends unsolicited frames
//! (pings, keep-alives) that would otherwise back up the socket.  Frames that
//! arrive while nothing is registered are discarded.  Pings are answered and
//! a peer close is echoed before the loop stops.
//!
//! Text frames reach the caller as raw bytes.  Their encoding is whatever
//! the XML prolog declares, which is the codec's business, not the
//! transport's.
//!
//! # Round trips
//!
//! At most one round trip is outstanding per connection.  A round trip
//! registers a [`Correlator`], writes its request frame, then waits for the
//! first of:
//!
//! 1. the correlator latching an outcome,
//! 2. the receive loop ending (its terminal error is reported),
//! 3. the call context ending.
//!
//! The correlator is unregistered on every exit path, including when the
//! waiting future is dropped.
//!
//! # Locking
//!
//! Connection state (liveness, terminal error, registered handler) sits
//! behind one `std::sync::Mutex` that is never held across an `.await`.  The
//! write half has its own async mutex because sending a frame awaits; the
//! receive loop only ever `try_lock`s it, so a stalled write cannot stop
//! reading.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::{Data, OpCode};
use tokio_tungstenite::tungstenite::protocol::frame::{Frame, FrameHeader};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_util::codec::{Framed, FramedParts};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::context::CallContext;
use super::correlator::{Correlator, Decision, FrameHandler};
use super::error::{RoundTripError, TransportError};
use super::frame::{Assembler, FrameCodec, Inbound};
use super::handshake::client_handshake;
use super::{lock, FrameTransport};
use crate::domain::ClientConfig;

/// Subprotocol offered during the opening handshake.
pub const SUBPROTOCOL: &str = "Lux_WS";

/// Upper bound for sending the close frame when closing.
const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

type FrameSink = Pin<Box<dyn Sink<Frame, Error = WsError> + Send>>;
type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, WsError>> + Send>>;

// ── Shared state ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct ConnectionState {
    /// Set by `close`; never reset.
    closed: bool,
    /// Why the receive loop ended.  Written once.
    recv_err: Option<TransportError>,
    /// Correlator of the outstanding round trip, if any.
    handler: Option<Arc<dyn FrameHandler>>,
}

/// State shared between the connection handle and its receive loop.
struct Shared {
    state: Mutex<ConnectionState>,
    /// Write half; `None` once a close frame has gone out.
    sink: tokio::sync::Mutex<Option<FrameSink>>,
    /// Cancelled when the receive loop has ended.
    recv_done: CancellationToken,
    /// Cancelled to stop the receive loop and abort pending writes.
    shutdown: CancellationToken,
}

impl Shared {
    fn new(sink: FrameSink) -> Self {
        Self {
            state: Mutex::default(),
            sink: tokio::sync::Mutex::new(Some(sink)),
            recv_done: CancellationToken::new(),
            shutdown: CancellationToken::new(),
        }
    }

    fn deliver(&self, payload: &[u8]) {
        let handler = lock(&self.state).handler.clone();
        match handler {
            Some(handler) => handler.handle(payload),
            None => trace!("no request outstanding; discarding {} byte frame", payload.len()),
        }
    }

    fn finish(&self, err: TransportError) {
        {
            let mut state = lock(&self.state);
            state.recv_err.get_or_insert(err);
        }
        self.recv_done.cancel();
    }

    fn terminal_error(&self) -> TransportError {
        lock(&self.state)
            .recv_err
            .clone()
            .unwrap_or(TransportError::NotRunning)
    }
}

/// Unregisters the outstanding correlator when dropped.
struct Registration<'a> {
    shared: &'a Shared,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        lock(&self.shared.state).handler = None;
    }
}

/// Records the end of the receive loop however it stops, including by a
/// panic in a frame handler.  A cause recorded earlier takes precedence.
struct FinishOnDrop(Arc<Shared>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.0.finish(TransportError::NotRunning);
    }
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// A LuxWS connection.
///
/// Call [`close`](Self::close) when done; it waits for the receive loop to
/// stop.  Dropping an unclosed transport only signals the loop to stop.
pub struct Transport {
    shared: Arc<Shared>,
    receiver: Mutex<Option<JoinHandle<()>>>,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
}

impl Transport {
    /// Dials `ws://<address>`, offering the `Lux_WS` subprotocol, and starts
    /// the receive loop.
    ///
    /// The handshake is bounded by `config.handshake_timeout` and by `ctx`.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Connect`] if the address is invalid or dialling or
    ///   the handshake fails.
    /// - [`TransportError::HandshakeTimeout`] if the handshake takes too long.
    /// - [`TransportError::Cancelled`] / [`TransportError::DeadlineExceeded`]
    ///   if `ctx` ends first.
    pub async fn connect(ctx: &CallContext, config: &ClientConfig) -> Result<Self, TransportError> {
        let url = config.url();
        let connect_error = |source: WsError| TransportError::Connect {
            url: url.clone(),
            source: Arc::new(source),
        };

        let mut request = url.as_str().into_client_request().map_err(connect_error)?;
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));

        debug!("connecting to {url}");

        let dial = async {
            let mut tcp = TcpStream::connect(config.address.as_str()).await?;
            let (response, leftover) = client_handshake(&mut tcp, request).await?;
            Ok::<_, WsError>((tcp, response, leftover))
        };
        let (tcp, response, leftover) = tokio::select! {
            biased;
            err = ctx.done() => return Err(err),
            result = tokio::time::timeout(config.handshake_timeout, dial) => match result {
                Ok(Ok(connected)) => connected,
                Ok(Err(source)) => return Err(connect_error(source)),
                Err(_) => {
                    return Err(TransportError::HandshakeTimeout {
                        url: url.clone(),
                        timeout: config.handshake_timeout,
                    })
                }
            },
        };

        debug!(
            "connected to {url} (subprotocol {:?})",
            response.headers().get(SEC_WEBSOCKET_PROTOCOL)
        );

        let local_addr = tcp.local_addr().ok();
        let peer_addr = tcp.peer_addr().ok();
        Ok(Self::start(tcp, leftover, local_addr, peer_addr))
    }

    /// Wraps a stream on which the WebSocket handshake has already been
    /// completed, e.g. one side of an in-memory pipe, and starts the receive
    /// loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_stream<S>(io: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        Self::start(io, BytesMut::new(), None, None)
    }

    fn start<S>(
        io: S,
        read_buf: BytesMut,
        local_addr: Option<SocketAddr>,
        peer_addr: Option<SocketAddr>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut parts = FramedParts::new::<Frame>(io, FrameCodec::default());
        parts.read_buf = read_buf;
        let (sink, frames) = Framed::from_parts(parts).split();
        let shared = Arc::new(Shared::new(Box::pin(sink)));

        let receiver = tokio::spawn(receive_loop(Box::pin(frames), Arc::clone(&shared)));

        Self {
            shared,
            receiver: Mutex::new(Some(receiver)),
            local_addr,
            peer_addr,
        }
    }

    /// Local socket address, when the connection runs over TCP.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Remote socket address, when the connection runs over TCP.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// `true` once the connection was closed or its receive loop ended.
    pub fn is_closed(&self) -> bool {
        lock(&self.shared.state).closed || self.shared.recv_done.is_cancelled()
    }

    /// Sends `request` and waits for the frame `on_frame` accepts.
    ///
    /// `on_frame` runs on the receive loop, once per non-empty inbound text
    /// message, until it returns something other than
    /// [`Decision::Ignore`].  It sees the payload bytes exactly as sent,
    /// without UTF-8 validation.  Keep it short.  If it panics, the receive
    /// loop ends and this call fails with [`TransportError::NotRunning`].
    ///
    /// Cancelling `ctx` only ends this call; the connection stays usable.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Closed`] after [`close`](Self::close); nothing
    ///   is written.
    /// - The receive loop's terminal error if it has already ended, or
    ///   ends while waiting.
    /// - [`TransportError::Busy`] if another round trip is outstanding.
    /// - [`TransportError::Io`] if the frame cannot be written.
    /// - The context's error if `ctx` ends first.
    /// - [`RoundTripError::Frame`] if `on_frame` fails.
    pub async fn round_trip<T, E, F>(
        &self,
        ctx: &CallContext,
        request: &str,
        on_frame: F,
    ) -> Result<T, RoundTripError<E>>
    where
        F: FnMut(&[u8]) -> Result<Decision<T>, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (correlator, mut outcome) = Correlator::new(on_frame);
        let _registration = self.register(Arc::new(correlator))?;

        self.write_frame(ctx, request).await?;

        let result = tokio::select! {
            biased;
            received = &mut outcome => received.ok(),
            _ = self.shared.recv_done.cancelled() => {
                // An outcome latched just before the loop ended still wins.
                outcome.try_recv().ok()
            }
            err = ctx.done() => {
                debug!("round trip abandoned: {err}");
                return Err(err.into());
            }
        };

        match result {
            Some(Ok(value)) => Ok(value),
            Some(Err(err)) => Err(RoundTripError::Frame(err)),
            None => Err(self.shared.terminal_error().into()),
        }
    }

    fn register(&self, handler: Arc<dyn FrameHandler>) -> Result<Registration<'_>, TransportError> {
        let mut state = lock(&self.shared.state);

        if state.closed {
            return Err(TransportError::Closed);
        }
        if self.shared.recv_done.is_cancelled() {
            return Err(state.recv_err.clone().unwrap_or(TransportError::NotRunning));
        }
        if state.handler.is_some() {
            return Err(TransportError::Busy);
        }

        state.handler = Some(handler);
        Ok(Registration {
            shared: &self.shared,
        })
    }

    async fn write_frame(&self, ctx: &CallContext, request: &str) -> Result<(), TransportError> {
        let mut guard = self.shared.sink.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::Closed)?;

        debug!("sending {} byte frame", request.len());
        let frame = Frame::message(request.as_bytes().to_vec(), OpCode::Data(Data::Text), true);

        tokio::select! {
            biased;
            _ = self.shared.shutdown.cancelled() => Err(TransportError::Closed),
            err = ctx.done() => Err(err),
            sent = sink.send(frame) => sent.map_err(|err| {
                warn!("send failed: {err}");
                TransportError::io(err)
            }),
        }
    }

    /// Closes the connection and waits for the receive loop to stop.
    ///
    /// A round trip blocked on this connection returns
    /// [`TransportError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the connection was already
    /// closed.
    pub async fn close(&self) -> Result<(), TransportError> {
        {
            let mut state = lock(&self.shared.state);
            if state.closed {
                return Err(TransportError::Closed);
            }
            state.closed = true;
        }

        debug!("closing connection");
        self.shared.shutdown.cancel();

        let receiver = lock(&self.receiver).take();
        if let Some(receiver) = receiver {
            if let Err(err) = receiver.await {
                warn!("receive loop did not finish cleanly: {err}");
            }
        }
        // Covers a receive loop that panicked before recording anything.
        self.shared.finish(TransportError::Closed);

        let sink = self.shared.sink.lock().await.take();
        if let Some(mut sink) = sink {
            let goodbye = async {
                sink.send(Frame::close(None)).await?;
                sink.close().await
            };
            match tokio::time::timeout(CLOSE_FRAME_TIMEOUT, goodbye).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => debug!("close frame not sent: {err}"),
                Err(_) => debug!("close frame not sent within {CLOSE_FRAME_TIMEOUT:?}"),
            }
        }

        Ok(())
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

#[async_trait]
impl FrameTransport for Transport {
    async fn round_trip<T, E, F>(
        &self,
        ctx: &CallContext,
        request: &str,
        on_frame: F,
    ) -> Result<T, RoundTripError<E>>
    where
        F: FnMut(&[u8]) -> Result<Decision<T>, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        Transport::round_trip(self, ctx, request, on_frame).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        Transport::close(self).await
    }
}

// ── Receive loop ──────────────────────────────────────────────────────────────

async fn receive_loop(mut frames: FrameStream, shared: Arc<Shared>) {
    let _finish = FinishOnDrop(Arc::clone(&shared));
    let mut assembler = Assembler::default();

    let err = loop {
        let next = tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => break TransportError::Closed,
            next = frames.next() => next,
        };

        let frame = match next {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => {
                warn!("receive failed: {err}");
                break TransportError::io(err);
            }
            None => {
                debug!("frame stream ended");
                break TransportError::NotRunning;
            }
        };

        match assembler.push(frame) {
            Ok(None) => {}
            Ok(Some(Inbound::Text(payload))) => {
                if payload.is_empty() {
                    continue;
                }
                debug!("received {} byte frame", payload.len());
                trace!("frame payload: {:?}", String::from_utf8_lossy(&payload));
                shared.deliver(&payload);
            }
            Ok(Some(Inbound::Ping(data))) => {
                reply(&shared, Frame::pong(data), false).await;
            }
            Ok(Some(Inbound::Close(payload))) => {
                debug!("peer closed the connection ({} byte close frame)", payload.len());
                // Echo the status code only.
                let code = payload.get(..2).map(<[u8]>::to_vec).unwrap_or_default();
                reply(&shared, Frame::from_payload(FrameHeader::default(), code), true).await;
                break TransportError::io(WsError::ConnectionClosed);
            }
            Ok(Some(Inbound::Binary(data))) => {
                trace!("discarding {} byte binary message", data.len());
            }
            Ok(Some(Inbound::Pong)) => trace!("discarding pong"),
            Err(err) => {
                warn!("receive failed: {err}");
                break TransportError::io(err);
            }
        }
    };

    debug!("receive loop stopped: {err}");
    shared.finish(err);
}

/// Sends a control frame from the receive loop, best effort.  Skipped when a
/// request is being written.  A `last` frame also releases the write half.
async fn reply(shared: &Shared, frame: Frame, last: bool) {
    let Ok(mut guard) = shared.sink.try_lock() else {
        debug!("write half busy; not sending {:?}", frame.header().opcode);
        return;
    };
    let Some(sink) = guard.as_mut() else {
        return;
    };

    let sent = tokio::select! {
        biased;
        _ = shared.shutdown.cancelled() => return,
        sent = tokio::time::timeout(CLOSE_FRAME_TIMEOUT, sink.send(frame)) => sent,
    };
    match sent {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!("control frame not sent: {err}"),
        Err(_) => debug!("control frame not sent within {CLOSE_FRAME_TIMEOUT:?}"),
    }

    if last {
        if let Some(mut sink) = guard.take() {
            if let Ok(Err(err)) = tokio::time::timeout(CLOSE_FRAME_TIMEOUT, sink.close()).await {
                debug!("write half not shut down: {err}");
            }
        }
    }
}
