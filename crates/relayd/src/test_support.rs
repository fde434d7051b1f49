//! Loopback socket helpers shared by unit tests.

use tokio::net::{TcpListener, TcpStream};

use crate::server::{Connection, ConnectionId, ConnectionLimits};

/// Returns an accepted server-side connection and the client-side peer.
pub(crate) async fn loopback_connection(
    id: u64,
    limits: ConnectionLimits,
) -> (Connection, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (peer, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    let (stream, _) = accepted.unwrap();

    (
        Connection::new(stream, ConnectionId::new(id), limits),
        peer.unwrap(),
    )
}
