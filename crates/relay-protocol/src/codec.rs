//! Newline-delimited frame codec for tokio.
//!
//! Every payload travels as one `\n`-terminated frame. Decoded payloads
//! never include the terminator (nor a preceding `\r`), and the encoder
//! appends a single `\n`. Payloads are opaque bytes; no text encoding is
//! assumed.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtocolError, Result};

/// Default maximum payload length in bytes.
pub const MAX_FRAME_LEN: usize = 1024;

/// Frame codec bounding each payload to `max_len` bytes.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Index of next byte to check for the delimiter
    next_index: usize,
    /// Maximum payload length (terminator excluded)
    max_len: usize,
}

impl FrameCodec {
    /// Creates a codec with the default payload limit.
    pub fn new() -> Self {
        Self::with_max_len(MAX_FRAME_LEN)
    }

    /// Creates a codec with a custom payload limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }

    /// Returns the payload limit.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    fn take_frame(&mut self, src: &mut BytesMut, end: usize, terminated: bool) -> Result<Bytes> {
        let mut frame = src.split_to(end);
        self.next_index = 0;

        if terminated {
            // Drop the '\n' itself
            src.advance(1);
        }
        if frame.last() == Some(&b'\r') {
            frame.truncate(frame.len() - 1);
        }

        if frame.len() > self.max_len {
            return Err(ProtocolError::FrameTooLong {
                actual: frame.len(),
                limit: self.max_len,
            });
        }

        Ok(frame.freeze())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        let start = self.next_index.min(src.len());
        if let Some(offset) = src[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            return self.take_frame(src, end, true).map(Some);
        }

        // No complete frame yet - remember where we stopped
        self.next_index = src.len();

        // One extra byte of slack for a pending '\r'
        if src.len() > self.max_len + 1 {
            return Err(ProtocolError::FrameTooLong {
                actual: src.len(),
                limit: self.max_len,
            });
        }

        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }

        // Peer closed mid-frame: deliver the remainder as the last frame
        let end = src.len();
        self.take_frame(src, end, false).map(Some)
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<()> {
        if payload.len() > self.max_len {
            return Err(ProtocolError::FrameTooLong {
                actual: payload.len(),
                limit: self.max_len,
            });
        }
        if let Some(position) = payload.iter().position(|b| *b == b'\n') {
            return Err(ProtocolError::EmbeddedDelimiter { position });
        }

        dst.reserve(payload.len() + 1);
        dst.put_slice(&payload);
        dst.put_u8(b'\n');
        Ok(())
    }
}
