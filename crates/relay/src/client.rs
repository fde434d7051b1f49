//! Relay server connection client.
//!
//! This module provides the `ChatClient` which handles:
//! - Connecting to the relay server over TCP
//! - Answering the server's name request with the configured nickname
//! - Forwarding every other server frame to the output sink
//! - Turning each input line into a `<nickname>: <text>` chat frame
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relay_protocol::{chat_line, is_nick_request, max_name_len, FrameCodec, MAX_FRAME_LEN};

use crate::error::{ClientError, Result};

/// Address dialed when none is configured
pub const DEFAULT_SERVER_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 5060));

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the chat client.
///
/// # Example
///
/// ```rust
/// use relay_client::ClientConfig;
///
/// let config = ClientConfig {
///     nickname: "alice".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.server_addr.port(), 5060);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay server address.
    pub server_addr: SocketAddr,

    /// Name sent in reply to the server's name request and used to
    /// prefix outgoing chat lines.
    pub nickname: String,

    /// Largest frame sent or accepted, in bytes.
    pub max_frame_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR,
            nickname: String::new(),
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

impl ClientConfig {
    /// Checks that the nickname can be sent and announced by the server.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidNickname` if the nickname contains a
    /// line break or is too long for the server's join notice.
    pub fn validate(&self) -> Result<()> {
        if self.nickname.contains(['\n', '\r']) {
            return Err(ClientError::InvalidNickname(
                "must not contain line breaks".to_string(),
            ));
        }

        let max = max_name_len(self.max_frame_len);
        if self.nickname.len() > max {
            return Err(ClientError::InvalidNickname(format!(
                "{} bytes (max: {max})",
                self.nickname.len()
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Chat Client
// ============================================================================

/// Interactive client for the relay server.
///
/// # Session Lifecycle
///
/// 1. Client connects to the server
/// 2. Server sends `NICK`; the client replies with its nickname
/// 3. Server frames (join/leave notices, chat lines, the connect
///    confirmation) are written to the output, one per line
/// 4. Each input line is sent as `<nickname>: <line>`
///
/// The client returns when the server closes the connection, on a
/// receive error, or when the cancellation token fires. Reaching the end
/// of input stops sending but keeps receiving.
///
/// # Example
///
/// ```rust,ignore
/// use relay_client::{ChatClient, ClientConfig};
/// use tokio::io::{stdin, stdout, BufReader};
/// use tokio_util::sync::CancellationToken;
///
/// let client = ChatClient::new(config, CancellationToken::new());
/// client.run(BufReader::new(stdin()), stdout()).await?;
/// ```
pub struct ChatClient {
    config: ClientConfig,
    cancel_token: CancellationToken,
}

impl ChatClient {
    /// Creates a new chat client.
    #[must_use]
    pub fn new(config: ClientConfig, cancel_token: CancellationToken) -> Self {
        Self {
            config,
            cancel_token,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connects to the configured server and runs the session.
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidNickname` if the nickname fails validation
    /// - `ClientError::Connect` if the server cannot be reached
    /// - `ClientError::Protocol` on a framing or send failure
    /// - `ClientError::Io` if reading input or writing output fails
    pub async fn run<I, O>(&self, input: I, output: O) -> Result<()>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        self.config.validate()?;

        let addr = self.config.server_addr;
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ClientError::Connect {
                addr,
                error: e.to_string(),
            })?;

        info!(server = %addr, nickname = %self.config.nickname, "Connected to relay server");

        self.drive(stream, input, output).await
    }

    /// Runs the session over an already established stream.
    pub async fn run_with_stream<S, I, O>(&self, stream: S, input: I, output: O) -> Result<()>
    where
        S: AsyncRead + AsyncWrite,
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        self.config.validate()?;
        self.drive(stream, input, output).await
    }

    async fn drive<S, I, O>(&self, stream: S, input: I, mut output: O) -> Result<()>
    where
        S: AsyncRead + AsyncWrite,
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let codec = FrameCodec::with_max_len(self.config.max_frame_len);
        let (read_half, write_half) = tokio::io::split(stream);
        let mut frames = FramedRead::new(read_half, codec.clone());
        let mut sink = FramedWrite::new(write_half, codec);

        let mut lines = input.lines();
        let mut input_open = true;

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Client shutdown requested");
                    break;
                }

                frame = frames.next() => match frame {
                    Some(Ok(payload)) => {
                        if is_nick_request(&payload) {
                            debug!(nickname = %self.config.nickname, "Answering name request");
                            sink.send(Bytes::from(self.config.nickname.clone())).await?;
                        } else {
                            output.write_all(&payload).await?;
                            output.write_all(b"\n").await?;
                            output.flush().await?;
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        info!("Server closed the connection");
                        break;
                    }
                },

                line = lines.next_line(), if input_open => match line? {
                    Some(text) => {
                        let frame = chat_line(&self.config.nickname, &text);
                        if frame.len() > self.config.max_frame_len {
                            warn!(
                                len = frame.len(),
                                max = self.config.max_frame_len,
                                "Message too long, not sent"
                            );
                            continue;
                        }
                        sink.send(frame).await?;
                    }
                    None => {
                        debug!("Input closed, receiving only");
                        input_open = false;
                    }
                },
            }
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
