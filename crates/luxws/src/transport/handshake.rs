//! Opening handshake over a caller-owned stream.
//!
//! tungstenite performs the HTTP upgrade, but its stream type would also own
//! the framing afterwards.  The handshake therefore runs over a borrowed
//! stream with every byte read recorded, so that frames the server sent
//! right behind its `101` response are not lost when framing is handed to
//! [`FrameCodec`](super::frame::FrameCodec).

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_tungstenite::client_async;
use tokio_tungstenite::tungstenite::handshake::client::{Request, Response};
use tokio_tungstenite::tungstenite::Error as WsError;

/// Performs the client handshake on `io`.
///
/// Returns the server's response and any bytes read past its end, which
/// belong to the first frames.
pub(crate) async fn client_handshake<S>(
    io: &mut S,
    request: Request,
) -> Result<(Response, BytesMut), WsError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut recorder = Recorder {
        io,
        seen: Vec::new(),
    };
    let (ws, response) = client_async(request, &mut recorder).await?;
    drop(ws);

    let leftover = BytesMut::from(after_headers(&recorder.seen));
    Ok((response, leftover))
}

/// Bytes following the first blank line of an HTTP message.
fn after_headers(seen: &[u8]) -> &[u8] {
    seen.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map_or(&[][..], |end| &seen[end + 4..])
}

/// Passes I/O through to `io`, keeping a copy of everything read.
struct Recorder<'a, S> {
    io: &'a mut S,
    seen: Vec<u8>,
}

impl<S: AsyncRead + Unpin> AsyncRead for Recorder<'_, S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut *this.io).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll {
            this.seen.extend_from_slice(&buf.filled()[before..]);
        }
        poll
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for Recorder<'_, S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut *self.get_mut().io).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.get_mut().io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.get_mut().io).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    #[test]
    fn test_after_headers_returns_trailing_bytes() {
        assert_eq!(after_headers(b"HTTP/1.1 101\r\nA: b\r\n\r\n\x81\x01x"), b"\x81\x01x");
        assert_eq!(after_headers(b"HTTP/1.1 101\r\n\r\n"), b"");
        assert_eq!(after_headers(b"partial"), b"");
    }

    #[tokio::test]
    async fn test_frame_sent_with_the_response_is_kept() {
        // Arrange: a server that answers the upgrade and immediately sends a
        // frame in the same write
        let (mut client_io, mut server_io) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = server_io.read(&mut chunk).await.unwrap();
                request.extend_from_slice(&chunk[..n]);
            }
            let text = String::from_utf8(request).unwrap();
            let key = text
                .lines()
                .find_map(|line| line.strip_prefix("Sec-WebSocket-Key: "))
                .unwrap()
                .trim()
                .to_owned();
            let accept = tokio_tungstenite::tungstenite::handshake::derive_accept_key(key.as_bytes());
            let mut reply = format!(
                "HTTP/1.1 101 Switching Protocols\r\n\
                 Connection: Upgrade\r\n\
                 Upgrade: websocket\r\n\
                 Sec-WebSocket-Accept: {accept}\r\n\r\n"
            )
            .into_bytes();
            reply.extend_from_slice(b"\x81\x02hi");
            server_io.write_all(&reply).await.unwrap();
            server_io
        });
        let request = "ws://127.0.0.1:8214".into_client_request().unwrap();

        // Act
        let (response, leftover) = client_handshake(&mut client_io, request).await.unwrap();

        // Assert
        assert_eq!(response.status(), 101);
        assert_eq!(&leftover[..], b"\x81\x02hi");
        drop(server.await.unwrap());
    }
}
