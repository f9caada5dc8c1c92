//! Connection settings.
//!
//! [`ClientConfig`] holds everything [`crate::Client::connect`] needs to
//! reach a controller.  Like the rest of the domain layer it never reads the
//! environment; binaries populate it from flags or a config file.

use std::time::Duration;

/// Default LuxWS port on the controller.
pub const DEFAULT_PORT: u16 = 8214;

/// Default upper bound for the WebSocket opening handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for a single controller connection.
///
/// # Example
///
/// ```rust
/// use luxws::ClientConfig;
/// use std::time::Duration;
///
/// let cfg = ClientConfig::new("heatpump.local:8214");
/// assert_eq!(cfg.url(), "ws://heatpump.local:8214");
/// assert_eq!(cfg.handshake_timeout, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Controller address in `<host>:<port>` form.  IPv6 literals must be
    /// bracketed (`[::1]:8214`).
    pub address: String,

    /// Maximum time the opening handshake may take, independent of any
    /// deadline on the call context passed to `connect`.
    pub handshake_timeout: Duration,
}

impl ClientConfig {
    /// Creates a config for `address` with the default handshake timeout.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Replaces the handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// The WebSocket URL dialled for this config.
    pub fn url(&self) -> String {
        format!("ws://{}", self.address)
    }
}

impl Default for ClientConfig {
    /// Loopback on the default port.
    fn default() -> Self {
        Self::new(format!("127.0.0.1:{DEFAULT_PORT}"))
    }
}
