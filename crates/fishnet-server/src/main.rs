//! Fishnet TCP server: entry point.
//!
//! Binds a non-blocking listener, admits clients in a polling loop, and closes
//! every connection on Ctrl+C.
//!
//! # Usage
//!
//! ```text
//! fishnet-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>   Config file [default: platform config dir]
//!   --host   <HOST>   Overrides `listener.host`
//!   --port   <PORT>   Overrides `listener.port`
//! ```
//!
//! | Variable          | Description                |
//! |-------------------|----------------------------|
//! | `FISHNET_CONFIG`  | Same as `--config`         |
//! | `FISHNET_HOST`    | Same as `--host`           |
//! | `FISHNET_PORT`    | Same as `--port`           |
//! | `RUST_LOG`        | Overrides `server.log_level` |

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fishnet_core::TcpListener;
use fishnet_server::application::accept_loop::AcceptLoop;
use fishnet_server::infrastructure::storage::config::{load_config, load_config_from, ServerConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Non-blocking TCP listener that accepts and tracks client connections.
#[derive(Debug, Parser)]
#[command(name = "fishnet-server", version)]
struct Cli {
    /// Path to the TOML config file.
    ///
    /// When omitted, the platform config directory is used; a missing file
    /// means built-in defaults.
    #[arg(long, env = "FISHNET_CONFIG")]
    config: Option<PathBuf>,

    /// IPv4 address to bind (`0.0.0.0` for every interface).
    #[arg(long, env = "FISHNET_HOST")]
    host: Option<String>,

    /// TCP port to bind (`0` lets the OS choose).
    #[arg(long, env = "FISHNET_PORT")]
    port: Option<u16>,
}

impl Cli {
    /// Loads the config file and applies command-line overrides on top.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => load_config().context("failed to load config")?,
        };
        if let Some(host) = self.host {
            config.listener.host = host;
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_server_config()?;

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    info!("Fishnet server starting");

    let listener = TcpListener::bind(config.listener.clone()).with_context(|| {
        format!(
            "failed to start listener on {}:{}",
            config.listener.host, config.listener.port
        )
    })?;

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let mut accept_loop = AcceptLoop::new(listener);
    let outcome = accept_loop.run(&running, config.poll_interval()).await;
    let stats = accept_loop.stats();

    let mut listener = accept_loop.into_source();
    let open_connections = listener.connections().len();
    listener.close().context("failed to close listener")?;
    outcome?;

    info!(
        accepted = stats.accepted,
        accept_errors = stats.errors,
        closed_connections = open_connections,
        "Fishnet server stopped"
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
