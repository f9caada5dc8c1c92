//! Protocol client: the two LuxWS operations on top of a frame transport.
//!
//! ```text
//!  authenticate(password) ── "LOGIN;<password>" ──► <Navigation> ──► NavigationRoot
//!  fetch_page(id)         ── "GET;<id>"         ──► <Content>    ──► ContentRoot
//! ```
//!
//! Each operation is one round trip.  Replies with a different root element
//! are skipped by the envelope codec; malformed replies fail the operation.
//! Nothing is retried here.

use thiserror::Error;
use tracing::debug;

use crate::domain::{ClientConfig, ContentRoot, NavigationRoot, NotFoundError};
use crate::protocol::codec::{decode_reply, CodecError, Envelope};
use crate::protocol::command::Command;
use crate::transport::{CallContext, FrameTransport, RoundTripError, Transport, TransportError};

/// Errors returned by [`Client`] operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The reply could not be decoded.
    #[error(transparent)]
    Decode(#[from] CodecError),

    /// A navigation entry looked up by name does not exist.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

impl From<RoundTripError<CodecError>> for ClientError {
    fn from(err: RoundTripError<CodecError>) -> Self {
        match err {
            RoundTripError::Transport(err) => ClientError::Transport(err),
            RoundTripError::Frame(err) => ClientError::Decode(err),
        }
    }
}

/// A LuxWS client over one connection.
///
/// Page identifiers returned by [`authenticate`](Self::authenticate) are only
/// valid on the connection that produced them.
pub struct Client<T = Transport> {
    transport: T,
}

impl Client<Transport> {
    /// Connects to the controller described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the connection cannot be
    /// established.
    pub async fn connect(ctx: &CallContext, config: &ClientConfig) -> Result<Self, ClientError> {
        let transport = Transport::connect(ctx, config).await?;
        Ok(Self::with_transport(transport))
    }
}

impl<T: FrameTransport> Client<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends `LOGIN;<password>` and returns the navigation tree.
    ///
    /// The password may be empty.
    ///
    /// # Errors
    ///
    /// Transport failures and undecodable replies.
    pub async fn authenticate(
        &self,
        ctx: &CallContext,
        password: &str,
    ) -> Result<NavigationRoot, ClientError> {
        self.request(ctx, Command::Login { password }).await
    }

    /// Sends `GET;<id>` and returns the content page.
    ///
    /// # Errors
    ///
    /// Transport failures and undecodable replies.
    pub async fn fetch_page(&self, ctx: &CallContext, id: &str) -> Result<ContentRoot, ClientError> {
        self.request(ctx, Command::Get { id }).await
    }

    /// Looks up the navigation entry called `name` and fetches its page.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`] if no entry has that name, otherwise as
    /// [`fetch_page`](Self::fetch_page).
    pub async fn fetch_page_by_name(
        &self,
        ctx: &CallContext,
        navigation: &NavigationRoot,
        name: &str,
    ) -> Result<ContentRoot, ClientError> {
        let entry = navigation.lookup(name)?;
        debug!("page {name:?} has id {}", entry.id);
        self.fetch_page(ctx, &entry.id).await
    }

    /// Closes the underlying connection.
    ///
    /// # Errors
    ///
    /// [`TransportError::Closed`] if the client was already closed.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.transport.close().await?;
        Ok(())
    }

    async fn request<R>(&self, ctx: &CallContext, command: Command<'_>) -> Result<R, ClientError>
    where
        R: Envelope + Send + 'static,
    {
        debug_assert_eq!(command.kind(), R::KIND);
        debug!("{} request, expecting {}", command.name(), R::KIND);

        let reply = self
            .transport
            .round_trip(ctx, &command.encode(), decode_reply::<R>)
            .await?;
        Ok(reply)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Decision;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    // ── Test doubles ──────────────────────────────────────────────────────────

    /// Answers each request with a scripted reply, after first offering an
    /// unrelated frame that must be ignored.
    struct FakeTransport {
        respond: fn(&str) -> String,
        requests: Mutex<Vec<String>>,
        closed: AtomicBool,
    }

    impl FakeTransport {
        fn new(respond: fn(&str) -> String) -> Self {
            Self {
                respond,
                requests: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl FrameTransport for FakeTransport {
        async fn round_trip<T, E, F>(
            &self,
            _ctx: &CallContext,
            request: &str,
            mut on_frame: F,
        ) -> Result<T, RoundTripError<E>>
        where
            F: FnMut(&[u8]) -> Result<Decision<T>, E> + Send + 'static,
            T: Send + 'static,
            E: Send + 'static,
        {
            self.requests.lock().unwrap().push(request.to_string());

            if !matches!(on_frame(b"<valid></valid>"), Ok(Decision::Ignore)) {
                panic!("unrelated reply was not ignored");
            }

            let response = (self.respond)(request);
            match on_frame(response.as_bytes()) {
                Ok(Decision::Accept(value)) => Ok(value),
                Ok(Decision::Ignore) => Err(TransportError::NotRunning.into()),
                Err(err) => Err(RoundTripError::Frame(err)),
            }
        }

        async fn close(&self) -> Result<(), TransportError> {
            if self.closed.swap(true, Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            Ok(())
        }
    }

    fn login_reply(request: &str) -> String {
        if request == "LOGIN;1234" {
            r#"<Navigation id="0x41c123c8"><item id="0x41123678"><name>Test</name></item></Navigation>"#
                .to_string()
        } else {
            "<unknown></unknown>".to_string()
        }
    }

    fn get_reply(request: &str) -> String {
        match request {
            "GET;0x41123678" => {
                r#"<content><item id="0x1"><name>Vorlauf</name><value>30.1°C</value></item></content>"#
                    .to_string()
            }
            _ => "<unknown></unknown>".to_string(),
        }
    }

    fn garbage(_: &str) -> String {
        "<definitely<not<xml".to_string()
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_authenticate_returns_navigation_tree() {
        // Arrange
        let client = Client::with_transport(FakeTransport::new(login_reply));
        let ctx = CallContext::new();

        // Act
        let nav = client.authenticate(&ctx, "1234").await.unwrap();

        // Assert
        assert_eq!(nav.tag, "Navigation");
        assert_eq!(nav.id, "0x41c123c8");
        assert_eq!(nav.items.len(), 1);
        assert_eq!(nav.items[0].name, "Test");
        assert_eq!(
            client.transport().requests.lock().unwrap().as_slice(),
            ["LOGIN;1234"]
        );
    }

    #[tokio::test]
    async fn test_authenticate_with_malformed_reply_is_decode_error() {
        let client = Client::with_transport(FakeTransport::new(garbage));

        let err = client
            .authenticate(&CallContext::new(), "1234")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Decode(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_fetch_page_by_name_uses_navigation_id() {
        // Arrange
        let client = Client::with_transport(FakeTransport::new(get_reply));
        let ctx = CallContext::new();
        let nav = NavigationRoot {
            tag: "Navigation".to_string(),
            id: "0x41c123c8".to_string(),
            items: vec![crate::domain::NavigationItem {
                id: "0x41123678".to_string(),
                name: "Informationen".to_string(),
                items: Vec::new(),
            }],
        };

        // Act
        let content = client
            .fetch_page_by_name(&ctx, &nav, "Informationen")
            .await
            .unwrap();

        // Assert
        assert_eq!(content.items[0].value.as_deref(), Some("30.1°C"));
    }

    #[tokio::test]
    async fn test_fetch_page_by_unknown_name_sends_nothing() {
        let client = Client::with_transport(FakeTransport::new(get_reply));
        let nav = NavigationRoot::default();

        let err = client
            .fetch_page_by_name(&CallContext::new(), &nav, "Informationen")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::NotFound(ref e) if e.name == "Informationen"));
        assert!(client.transport().requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_close_reports_closed() {
        let client = Client::with_transport(FakeTransport::new(garbage));

        client.close().await.unwrap();
        let err = client.close().await.unwrap_err();

        assert!(matches!(err, ClientError::Transport(TransportError::Closed)));
    }
}
