//! relay - terminal chat client
//!
//! Connects to a relay server, prints every message it relays, and sends
//! each line typed on standard input as `<nickname>: <line>`.
//!
//! # Usage
//!
//! ```text
//! relay                          # prompts for a nickname
//! relay --nick alice
//! relay --server 10.0.0.5:5060 --nick bob
//! RELAY_SERVER=10.0.0.5:5060 relay
//! ```

use std::env;
use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use relay_client::{ChatClient, ClientConfig, DEFAULT_SERVER_ADDR};

/// Environment variable naming the server address
const SERVER_ENV_VAR: &str = "RELAY_SERVER";

const NICKNAME_PROMPT: &str = "Choose your nickname: ";

// ============================================================================
// CLI Arguments
// ============================================================================

/// relay - chat with everyone connected to a relay server
#[derive(Parser, Debug)]
#[command(name = "relay", version, about)]
struct Args {
    /// Server address (default 127.0.0.1:5060, or RELAY_SERVER)
    #[arg(short, long)]
    server: Option<SocketAddr>,

    /// Nickname to join with (prompted for when omitted)
    #[arg(short, long)]
    nick: Option<String>,
}

fn server_addr(args: &Args) -> Result<SocketAddr> {
    if let Some(addr) = args.server {
        return Ok(addr);
    }
    match env::var(SERVER_ENV_VAR) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("Invalid {SERVER_ENV_VAR} address: {value}")),
        Err(_) => Ok(DEFAULT_SERVER_ADDR),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let server_addr = server_addr(&args)?;
    run_client(server_addr, args.nick)
}

#[tokio::main]
async fn run_client(server_addr: SocketAddr, nick: Option<String>) -> Result<()> {
    // Logs go to stderr so they never interleave with chat output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("relay_client=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut input = BufReader::new(io::stdin());
    let nickname = match nick {
        Some(nick) => nick,
        None => prompt_nickname(&mut input).await?,
    };

    let config = ClientConfig {
        server_addr,
        nickname,
        ..Default::default()
    };
    config.validate().context("Cannot join with this nickname")?;

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Error waiting for Ctrl+C");
            return;
        }
        debug!("Received Ctrl+C");
        shutdown_token.cancel();
    });

    info!(server = %server_addr, "relay client starting");

    ChatClient::new(config, cancel_token)
        .run(input, io::stdout())
        .await
        .context("Chat session failed")?;

    Ok(())
}

async fn prompt_nickname(input: &mut BufReader<io::Stdin>) -> Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(NICKNAME_PROMPT.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        bail!("No nickname given");
    }

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
