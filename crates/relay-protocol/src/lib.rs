//! Relay Protocol - Wire framing for chat relay communication
//!
//! This crate provides the newline-delimited frame codec and the fixed
//! protocol literals exchanged between the relay daemon and its clients.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{FrameCodec, MAX_FRAME_LEN};
pub use error::ProtocolError;
pub use message::{
    chat_line, is_nick_request, join_notice, leave_notice, max_name_len, CONNECTED, NICK_REQUEST,
    NOTICE_OVERHEAD,
};
