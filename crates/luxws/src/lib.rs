//! # luxws
//!
//! Client library for the LuxWS protocol spoken by heat-pump controllers over
//! a persistent WebSocket connection.
//!
//! The crate is organised in three layers plus a thin client on top:
//!
//! - **`domain`** – The two typed reply trees (navigation menu and content
//!   page), their depth-first name lookup, and the connection settings.
//!   No I/O.
//!
//! - **`protocol`** – The command strings (`LOGIN;<password>`, `GET;<id>`),
//!   a structural XML parser that honours declared character encodings, and
//!   the envelope codec that decides whether a reply frame is the answer to
//!   the outstanding request or must be ignored.
//!
//! - **`transport`** – One long-lived duplex connection with a background
//!   receive loop that keeps draining inbound frames, plus a single-slot
//!   request/response primitive built on a one-shot response correlator.
//!
//! - **`client`** – Composes the layers into the two supported operations:
//!   [`Client::authenticate`] and [`Client::fetch_page`].
//!
//! # Example
//!
//! ```no_run
//! use luxws::{CallContext, Client, ClientConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), luxws::ClientError> {
//! let ctx = CallContext::with_timeout(Duration::from_secs(60));
//! let client = Client::connect(&ctx, &ClientConfig::new("192.0.2.1:8214")).await?;
//!
//! let navigation = client.authenticate(&ctx, "").await?;
//! let page = navigation.lookup("Informationen")?;
//! let content = client.fetch_page(&ctx, &page.id).await?;
//! println!("{} top-level groups", content.items.len());
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod domain;
pub mod protocol;
pub mod transport;

pub use client::{Client, ClientError};
pub use domain::config::{ClientConfig, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_PORT};
pub use domain::content::{ContentItem, ContentOption, ContentRoot};
pub use domain::navigation::{NavigationItem, NavigationRoot};
pub use domain::NotFoundError;
pub use protocol::codec::{decode_reply, CodecError, Envelope};
pub use protocol::command::{Command, Kind};
pub use transport::{
    CallContext, Decision, FrameTransport, RoundTripError, Transport, TransportError,
};
