//! relayd - TCP chat relay server
//!
//! Accepts chat clients, asks each for a display name, and rebroadcasts
//! every line a client sends to all connected clients.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (127.0.0.1:5060)
//! relayd
//!
//! # Listen elsewhere
//! relayd --listen 0.0.0.0:6000
//! RELAY_LISTEN=0.0.0.0:6000 relayd
//!
//! # Use an explicit config file
//! relayd --config ./relayd.toml
//! ```

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relayd::config::{ServerConfig, LISTEN_ENV_VAR};
use relayd::registry::spawn_registry;
use relayd::server::RelayServer;

/// relayd - chat relay server
#[derive(Parser, Debug)]
#[command(name = "relayd", version, about)]
struct Args {
    /// Address to listen on (overrides config file and RELAY_LISTEN)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;
    run_server(config)
}

/// Applies file, environment and command line settings in that order.
fn resolve_config(args: &Args) -> Result<ServerConfig> {
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    if let Ok(value) = env::var(LISTEN_ENV_VAR) {
        let addr = value
            .parse()
            .with_context(|| format!("Invalid {LISTEN_ENV_VAR} address: {value}"))?;
        config = config.with_listen_addr(addr);
    }

    if let Some(addr) = args.listen {
        config = config.with_listen_addr(addr);
    }

    Ok(config)
}

#[tokio::main]
async fn run_server(config: ServerConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("relayd=info".parse()?)
                .add_directive("relay_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "relay server starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = spawn_registry();
    info!("Connection registry started");

    let server = RelayServer::bind(config, registry, cancel_token)
        .await
        .context("Failed to start relay server")?;

    server.run().await;

    info!("relay server stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
