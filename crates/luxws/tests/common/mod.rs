//! Shared fixtures: an in-memory WebSocket pipe and a scripted controller.

#![allow(dead_code)]

use std::convert::Infallible;

use futures_util::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::{Data, OpCode};
use tokio_tungstenite::tungstenite::protocol::frame::Frame;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use luxws::{Decision, Transport};

pub type ServerStream = WebSocketStream<DuplexStream>;

/// A transport connected to the returned server end over an in-memory pipe.
pub async fn pair() -> (Transport, ServerStream) {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    (Transport::from_stream(client_io), server)
}

/// A final text frame carrying `payload` unvalidated, the way a controller
/// sends replies in a declared non-UTF-8 encoding.
pub fn raw_text(payload: &[u8]) -> Message {
    Message::Frame(Frame::message(
        payload.to_vec(),
        OpCode::Data(Data::Text),
        true,
    ))
}

/// Runs a fake controller that answers every text request with the frames
/// `respond` returns.  Resolves to the requests seen once the client goes
/// away.
pub fn serve<F>(mut server: ServerStream, mut respond: F) -> JoinHandle<Vec<String>>
where
    F: FnMut(&str) -> Vec<Message> + Send + 'static,
{
    tokio::spawn(async move {
        let mut requests = Vec::new();
        while let Some(Ok(message)) = server.next().await {
            if let Message::Text(text) = message {
                for reply in respond(&text) {
                    if server.send(reply).await.is_err() {
                        break;
                    }
                }
                requests.push(text);
            }
        }
        requests
    })
}

/// Echoes each request back as one text frame.
pub fn echo(request: &str) -> Vec<Message> {
    vec![Message::Text(request.to_string())]
}

/// Accepts any frame as the answer.
pub fn accept_any(payload: &[u8]) -> Result<Decision<String>, Infallible> {
    Ok(Decision::Accept(String::from_utf8_lossy(payload).into_owned()))
}
