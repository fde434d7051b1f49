//! Protocol literals.
//!
//! The relay has no structured message types: every payload is opaque
//! bytes. The server only ever originates the handful of literals below;
//! chat lines are composed by the client and relayed verbatim.

use bytes::Bytes;

/// Sent by the server immediately after accepting a connection.
pub const NICK_REQUEST: &[u8] = b"NICK";

/// Sent to a newly registered client once its join has been announced.
pub const CONNECTED: &[u8] = b"Connected to server!";

/// Returns true if the payload is the server's display-name request.
pub fn is_nick_request(payload: &[u8]) -> bool {
    payload == NICK_REQUEST
}

/// Bytes a notice adds around a display name (`" joined! "`, the longer
/// of the two notices).
pub const NOTICE_OVERHEAD: usize = b" joined! ".len();

/// Longest display name whose notices still fit in `max_frame_len`.
pub fn max_name_len(max_frame_len: usize) -> usize {
    max_frame_len.saturating_sub(NOTICE_OVERHEAD)
}

/// Join announcement. The trailing space is part of the wire format.
pub fn join_notice(name: &str) -> Bytes {
    Bytes::from(format!("{name} joined! "))
}

/// Departure announcement.
pub fn leave_notice(name: &str) -> Bytes {
    Bytes::from(format!("{name} left!"))
}

/// Chat line as composed by a client: `<name>: <text>`.
pub fn chat_line(name: &str, text: &str) -> Bytes {
    Bytes::from(format!("{name}: {text}"))
}
