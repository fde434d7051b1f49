//! Integration tests for the TCP relay server.
//!
//! These tests run a real `RelayServer` on a loopback port and talk to it
//! with raw line-oriented sockets, checking the wire protocol end to end:
//! handshake, join/leave notices, self-echo, ordering and cleanup.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::net::SocketAddr;
use std::time::Duration;

use relay_protocol::{max_name_len, MAX_FRAME_LEN};
use relayd::config::ServerConfig;
use relayd::registry::{spawn_registry, RegistryHandle};
use relayd::server::RelayServer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for any single line from the server
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Maximum time to wait for registry state to settle
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Interval between registry polls
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Grace period for server shutdown
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// Test Helpers
// ============================================================================

/// Test server context that manages server lifecycle.
struct TestServer {
    addr: SocketAddr,
    registry: RegistryHandle,
    cancel_token: CancellationToken,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(ServerConfig::default()).await
    }

    async fn spawn_with(config: ServerConfig) -> Self {
        let config = config.with_listen_addr("127.0.0.1:0".parse().unwrap());
        let registry = spawn_registry();
        let cancel_token = CancellationToken::new();

        let server = RelayServer::bind(config, registry.clone(), cancel_token.clone())
            .await
            .expect("bind test server");
        let addr = server.local_addr();

        tokio::spawn(async move {
            server.run().await;
        });

        TestServer {
            addr,
            registry,
            cancel_token,
        }
    }

    /// Opens a raw connection without performing the handshake.
    async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr)
            .await
            .expect("connect to server");
        TestClient::new(stream)
    }

    /// Opens a raw connection whose receive buffer is as small as the OS allows.
    async fn connect_small_buffer(&self) -> TestClient {
        let socket = TcpSocket::new_v4().unwrap();
        socket.set_recv_buffer_size(4096).unwrap();
        let stream = socket.connect(self.addr).await.expect("connect to server");
        TestClient::new(stream)
    }

    /// Connects and completes the handshake as `name`.
    async fn join(&self, name: &str) -> TestClient {
        let mut client = self.connect().await;
        client.handshake(name).await;
        client
    }

    /// Waits until the registry holds exactly `expected` sessions.
    async fn wait_for_count(&self, expected: usize) {
        let start = Instant::now();
        loop {
            let count = self.registry.count().await;
            if count == expected {
                return;
            }
            assert!(
                start.elapsed() < SETTLE_TIMEOUT,
                "registry count stuck at {count}, expected {expected}"
            );
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn shutdown(self) {
        self.cancel_token.cancel();
        sleep(SHUTDOWN_GRACE_PERIOD).await;
    }
}

/// Line-oriented test client.
struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Sends one frame (newline appended).
    async fn send(&mut self, payload: &str) {
        self.writer.write_all(payload.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn send_raw(&mut self, data: &[u8]) {
        self.writer.write_all(data).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Receives one frame, without its terminator.
    async fn recv(&mut self) -> String {
        let mut line = String::new();
        let n = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for server")
            .unwrap();
        assert!(n > 0, "server closed the connection");
        line.trim_end_matches('\n').to_string()
    }

    /// Asserts the server closes the connection.
    async fn expect_closed(&mut self) {
        let mut line = String::new();
        let n = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for close")
            .unwrap_or(0);
        assert_eq!(n, 0, "expected close, got {line:?}");
    }

    /// Performs the name handshake and consumes the confirmation lines.
    async fn handshake(&mut self, name: &str) {
        assert_eq!(self.recv().await, "NICK");
        self.send(name).await;
        assert_eq!(self.recv().await, format!("{name} joined! "));
        assert_eq!(self.recv().await, "Connected to server!");
    }
}

// ============================================================================
// Handshake Tests
// ============================================================================

#[tokio::test]
async fn test_server_requests_nick_on_accept() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    assert_eq!(client.recv().await, "NICK");

    server.shutdown().await;
}

#[tokio::test]
async fn test_handshake_sequence() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    assert_eq!(client.recv().await, "NICK");
    client.send("alice").await;

    // Already registered when the join notice goes out, so it sees its own
    assert_eq!(client.recv().await, "alice joined! ");
    assert_eq!(client.recv().await, "Connected to server!");
    server.wait_for_count(1).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_crlf_name_is_trimmed() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    assert_eq!(client.recv().await, "NICK");
    client.send_raw(b"alice\r\n").await;
    assert_eq!(client.recv().await, "alice joined! ");

    server.shutdown().await;
}

#[tokio::test]
async fn test_slow_handshake_does_not_block_admission() {
    let server = TestServer::spawn().await;

    // Never answers NICK
    let mut silent = server.connect().await;
    assert_eq!(silent.recv().await, "NICK");

    let _alice = server.join("alice").await;
    server.wait_for_count(1).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_abandoned_handshake_sends_no_departure() {
    let server = TestServer::spawn().await;
    let mut alice = server.join("alice").await;

    let mut ghost = server.connect().await;
    assert_eq!(ghost.recv().await, "NICK");
    drop(ghost);

    let _bob = server.join("bob").await;

    // Alice sees bob's join, never a departure for the ghost
    assert_eq!(alice.recv().await, "bob joined! ");
    server.wait_for_count(2).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_handshake_timeout_closes_connection() {
    let config = ServerConfig {
        handshake_timeout_ms: 50,
        ..ServerConfig::default()
    };
    let server = TestServer::spawn_with(config).await;
    let mut client = server.connect().await;

    assert_eq!(client.recv().await, "NICK");
    client.expect_closed().await;
    assert_eq!(server.registry.count().await, 0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_longest_name_announced() {
    let server = TestServer::spawn().await;
    let mut alice = server.join("alice").await;

    let long_name = "b".repeat(max_name_len(MAX_FRAME_LEN));
    let long = server.join(&long_name).await;
    assert_eq!(alice.recv().await, format!("{long_name} joined! "));

    drop(long);
    assert_eq!(alice.recv().await, format!("{long_name} left!"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_overlong_name_rejected_at_handshake() {
    let server = TestServer::spawn().await;
    let mut alice = server.join("alice").await;

    // Fits in a frame, but its join notice would not
    let mut long = server.connect().await;
    assert_eq!(long.recv().await, "NICK");
    long.send(&"b".repeat(1020)).await;
    long.expect_closed().await;

    // Alice's next line is her own message: no join or leave was announced
    alice.send("alice: ping").await;
    assert_eq!(alice.recv().await, "alice: ping");
    assert_eq!(server.registry.count().await, 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_names_accepted() {
    let server = TestServer::spawn().await;

    let _first = server.join("alice").await;
    let _second = server.join("alice").await;
    server.wait_for_count(2).await;

    server.shutdown().await;
}

// ============================================================================
// Broadcast Tests
// ============================================================================

#[tokio::test]
async fn test_join_announced_to_existing_clients() {
    let server = TestServer::spawn().await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;

    assert_eq!(alice.recv().await, "bob joined! ");

    let _carol = server.join("carol").await;
    assert_eq!(alice.recv().await, "carol joined! ");
    assert_eq!(bob.recv().await, "carol joined! ");

    server.shutdown().await;
}

#[tokio::test]
async fn test_sender_receives_own_message() {
    let server = TestServer::spawn().await;
    let mut alice = server.join("alice").await;

    alice.send("alice: hello").await;
    assert_eq!(alice.recv().await, "alice: hello");

    server.shutdown().await;
}

#[tokio::test]
async fn test_payload_relayed_verbatim() {
    let server = TestServer::spawn().await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    assert_eq!(alice.recv().await, "bob joined! ");

    // No server-side tagging: whatever the sender wrote is what peers get
    alice.send("not prefixed at all  ").await;
    assert_eq!(bob.recv().await, "not prefixed at all  ");
    assert_eq!(alice.recv().await, "not prefixed at all  ");

    server.shutdown().await;
}

#[tokio::test]
async fn test_coalesced_writes_stay_separate_messages() {
    let server = TestServer::spawn().await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    assert_eq!(alice.recv().await, "bob joined! ");

    alice.send_raw(b"alice: one\nalice: two\n").await;
    assert_eq!(bob.recv().await, "alice: one");
    assert_eq!(bob.recv().await, "alice: two");

    server.shutdown().await;
}

#[tokio::test]
async fn test_order_preserved_per_sender() {
    let server = TestServer::spawn().await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    assert_eq!(alice.recv().await, "bob joined! ");

    for i in 0..50 {
        alice.send(&format!("alice: {i}")).await;
    }

    for i in 0..50 {
        assert_eq!(bob.recv().await, format!("alice: {i}"));
    }
    for i in 0..50 {
        assert_eq!(alice.recv().await, format!("alice: {i}"));
    }

    server.shutdown().await;
}

// ============================================================================
// Departure Tests
// ============================================================================

#[tokio::test]
async fn test_end_to_end_scenario() {
    let server = TestServer::spawn().await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    assert_eq!(alice.recv().await, "bob joined! ");

    alice.send("alice: hi").await;
    assert_eq!(bob.recv().await, "alice: hi");

    drop(alice);
    assert_eq!(bob.recv().await, "alice left!");
    server.wait_for_count(1).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_departure_announced_exactly_once() {
    let server = TestServer::spawn().await;
    let alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    let mut carol = server.join("carol").await;
    assert_eq!(bob.recv().await, "carol joined! ");

    drop(alice);
    assert_eq!(bob.recv().await, "alice left!");
    assert_eq!(carol.recv().await, "alice left!");

    // The very next line after the departure is bob's message, not a repeat
    bob.send("bob: still here").await;
    assert_eq!(carol.recv().await, "bob: still here");
    assert_eq!(bob.recv().await, "bob: still here");

    server.wait_for_count(2).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_oversized_frame_ends_session() {
    let server = TestServer::spawn().await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    assert_eq!(alice.recv().await, "bob joined! ");

    let huge = "x".repeat(2000);
    alice.send(&huge).await;

    assert_eq!(bob.recv().await, "alice left!");
    alice.expect_closed().await;
    server.wait_for_count(1).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_surviving_clients_keep_chatting() {
    let server = TestServer::spawn().await;
    let mut alice = server.join("alice").await;
    let bob = server.join("bob").await;
    let mut carol = server.join("carol").await;
    assert_eq!(alice.recv().await, "bob joined! ");
    assert_eq!(alice.recv().await, "carol joined! ");

    drop(bob);
    assert_eq!(alice.recv().await, "bob left!");
    assert_eq!(carol.recv().await, "bob left!");

    alice.send("alice: anyone?").await;
    assert_eq!(carol.recv().await, "alice: anyone?");

    server.shutdown().await;
}

#[tokio::test]
async fn test_all_disconnect_empties_registry() {
    let server = TestServer::spawn().await;

    let mut clients = Vec::new();
    for i in 0..5 {
        clients.push(server.join(&format!("user{i}")).await);
    }
    server.wait_for_count(5).await;

    clients.clear();
    server.wait_for_count(0).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_stalled_recipient_does_not_block_others() {
    let config = ServerConfig {
        write_timeout_ms: 50,
        ..ServerConfig::default()
    };
    let server = TestServer::spawn_with(config).await;

    // Joins first, so every broadcast reaches it before anyone else
    let mut stalled = server.connect_small_buffer().await;
    stalled.handshake("stalled").await;

    let mut alice = server.join("alice").await;

    // Fill the stalled client's buffers until a round trip pays the write timeout
    let filler = format!("alice: {}", "x".repeat(1000));
    let mut stalled_seen = false;
    for _ in 0..20_000 {
        let start = Instant::now();
        alice.send(&filler).await;
        assert_eq!(alice.recv().await, filler);
        if start.elapsed() >= Duration::from_millis(30) {
            stalled_seen = true;
            break;
        }
    }
    assert!(stalled_seen, "recipient buffers never filled up");

    // Others can still join, chat and leave
    let mut bob = server.join("bob").await;
    assert_eq!(alice.recv().await, "bob joined! ");

    bob.send("bob: still flowing").await;
    assert_eq!(alice.recv().await, "bob: still flowing");
    assert_eq!(bob.recv().await, "bob: still flowing");

    drop(bob);
    assert_eq!(alice.recv().await, "bob left!");

    // The stalled client is never evicted by failed deliveries
    server.wait_for_count(2).await;

    server.shutdown().await;
}

// ============================================================================
// Shutdown Tests
// ============================================================================

#[tokio::test]
async fn test_cancel_stops_accepting() {
    let server = TestServer::spawn().await;
    let addr = server.addr;

    server.shutdown().await;

    let result = timeout(RECV_TIMEOUT, TcpStream::connect(addr)).await;
    assert!(matches!(result, Ok(Err(_))), "listener still accepting");
}
