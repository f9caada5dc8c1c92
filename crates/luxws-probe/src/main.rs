//! LuxWS probe: reads one page from a heat-pump controller and prints it.
//!
//! The probe connects, logs in, looks up a navigation entry by name, fetches
//! that entry's content page and prints it as an indented tree or as JSON.
//! It is meant for checking connectivity and for discovering the names a
//! controller actually uses before wiring it into anything else.
//!
//! # Usage
//!
//! ```text
//! luxws-probe [OPTIONS]
//!
//! Options:
//!   --config  <PATH>      TOML config file
//!   --address <HOST:PORT> Controller address [default: 127.0.0.1:8214]
//!   --password <PASS>     Login password [default: empty]
//!   --page    <NAME>      Navigation entry to fetch [default: Informationen]
//!   --format  <FORMAT>    tree | json [default: tree]
//!   --handshake-timeout <SECS>
//!   --request-timeout   <SECS>
//!   --log-level <LEVEL>
//! ```
//!
//! # Environment variable overrides
//!
//! Every flag can also be set through the environment.  Flags take precedence
//! over the environment, which takes precedence over the config file.
//!
//! | Variable                    | Flag                  |
//! |-----------------------------|-----------------------|
//! | `LUXWS_CONFIG`              | `--config`            |
//! | `LUXWS_ADDRESS`             | `--address`           |
//! | `LUXWS_PASSWORD`            | `--password`          |
//! | `LUXWS_PAGE`                | `--page`              |
//! | `LUXWS_FORMAT`              | `--format`            |
//! | `LUXWS_HANDSHAKE_TIMEOUT`   | `--handshake-timeout` |
//! | `LUXWS_REQUEST_TIMEOUT`     | `--request-timeout`   |
//! | `LUXWS_LOG_LEVEL`           | `--log-level`         |
//!
//! `RUST_LOG`, when set, replaces the log level entirely.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use luxws::{CallContext, Client, ContentRoot};
use luxws_probe::config::{load_config, ProbeConfig};
use luxws_probe::render::{render, OutputFormat};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Reads one page from a LuxWS heat-pump controller.
///
/// Options left unset fall back to the config file, then to built-in
/// defaults.
#[derive(Debug, Parser)]
#[command(
    name = "luxws-probe",
    about = "Reads one page from a LuxWS heat-pump controller",
    version
)]
struct Cli {
    /// TOML config file.  A missing file is treated as empty.
    #[arg(long, env = "LUXWS_CONFIG")]
    config: Option<PathBuf>,

    /// Controller address as `<host>:<port>`.
    #[arg(long, env = "LUXWS_ADDRESS")]
    address: Option<String>,

    /// Login password.
    #[arg(long, env = "LUXWS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Name of the navigation entry whose page is fetched.
    #[arg(long, env = "LUXWS_PAGE")]
    page: Option<String>,

    #[arg(long, value_enum, env = "LUXWS_FORMAT")]
    format: Option<OutputFormat>,

    /// Upper bound for the WebSocket handshake, in seconds.
    #[arg(long, env = "LUXWS_HANDSHAKE_TIMEOUT")]
    handshake_timeout: Option<u64>,

    /// Upper bound for each request, in seconds.
    #[arg(long, env = "LUXWS_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "LUXWS_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the config file named by `--config`, if any, and applies the
    /// flags on top of it.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed.
    fn into_probe_config(self) -> anyhow::Result<ProbeConfig> {
        let file = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ProbeConfig::default(),
        };
        Ok(self.apply(file))
    }

    /// Overrides every file value for which a flag was given.
    fn apply(self, mut cfg: ProbeConfig) -> ProbeConfig {
        if let Some(address) = self.address {
            cfg.controller.address = address;
        }
        if let Some(password) = self.password {
            cfg.controller.password = password;
        }
        if let Some(secs) = self.handshake_timeout {
            cfg.controller.handshake_timeout_secs = secs;
        }
        if let Some(secs) = self.request_timeout {
            cfg.controller.request_timeout_secs = secs;
        }
        if let Some(page) = self.page {
            cfg.probe.page = page;
        }
        if let Some(format) = self.format {
            cfg.probe.format = format;
        }
        if let Some(level) = self.log_level {
            cfg.probe.log_level = level;
        }
        cfg
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Cli::parse().into_probe_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.probe.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Ctrl+C cancels whatever request is in flight.
    let root = CallContext::new();
    let canceller = root.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, cancelling");
                canceller.cancel();
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    let content = probe(&root, &cfg).await?;
    let text = render(&content, cfg.probe.format).context("failed to render page")?;
    println!("{}", text.trim_end());
    Ok(())
}

/// Connects, fetches the configured page and closes the connection again,
/// even when a request failed.
async fn probe(root: &CallContext, cfg: &ProbeConfig) -> anyhow::Result<ContentRoot> {
    let client_config = cfg.controller.client_config();

    info!("connecting to {}", client_config.url());
    let client = Client::connect(root, &client_config)
        .await
        .with_context(|| format!("failed to connect to {}", client_config.url()))?;

    let result = fetch(&client, root, cfg).await;

    if let Err(e) = client.close().await {
        warn!("closing the connection failed: {e}");
    }
    let content = result.with_context(|| format!("failed to read page {:?}", cfg.probe.page))?;
    info!(
        "page {:?} has {} top-level items",
        cfg.probe.page,
        content.items.len()
    );
    Ok(content)
}

async fn fetch(
    client: &Client,
    root: &CallContext,
    cfg: &ProbeConfig,
) -> anyhow::Result<ContentRoot> {
    let timeout = cfg.controller.request_timeout();

    let navigation = client
        .authenticate(&root.child_with_timeout(timeout), &cfg.controller.password)
        .await
        .context("login failed")?;
    info!("logged in, {} navigation entries", navigation.items.len());

    let content = client
        .fetch_page_by_name(&root.child_with_timeout(timeout), &navigation, &cfg.probe.page)
        .await?;
    Ok(content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
