//! Optional TOML configuration for the probe.
//!
//! Every field has a default, so an empty or partial file is valid and a
//! missing file behaves like an empty one.  Command-line flags override
//! whatever the file says.
//!
//! ```toml
//! [controller]
//! address = "192.168.1.40:8214"
//! password = ""
//! handshake_timeout_secs = 30
//! request_timeout_secs = 10
//!
//! [probe]
//! page = "Informationen"
//! format = "tree"
//! log_level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use luxws::{ClientConfig, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_PORT};
use serde::Deserialize;
use thiserror::Error;

use crate::render::OutputFormat;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level probe configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProbeConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub probe: ProbeSection,
}

/// How to reach and authenticate against the controller.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ControllerConfig {
    /// `<host>:<port>` of the controller's LuxWS endpoint.
    #[serde(default = "default_address")]
    pub address: String,
    /// Login password.  Most controllers accept the empty string for
    /// read-only access.
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// Upper bound for each request/reply exchange.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// What to fetch and how to print it.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProbeSection {
    /// Name of the navigation entry whose page is fetched.
    #[serde(default = "default_page")]
    pub page: String,
    #[serde(default)]
    pub format: OutputFormat,
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_address() -> String {
    format!("127.0.0.1:{DEFAULT_PORT}")
}
fn default_handshake_timeout_secs() -> u64 {
    DEFAULT_HANDSHAKE_TIMEOUT.as_secs()
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_page() -> String {
    "Informationen".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            password: String::new(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            page: default_page(),
            format: OutputFormat::default(),
            log_level: default_log_level(),
        }
    }
}

impl ControllerConfig {
    /// Connection settings for the protocol client.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.address.clone())
            .with_handshake_timeout(Duration::from_secs(self.handshake_timeout_secs))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads the config at `path`, returning `ProbeConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ProbeConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProbeConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Parses config text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed or a field has the
/// wrong type.
pub fn parse_config(content: &str) -> Result<ProbeConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
