//! Binary frame format and reassembly.
//!
//! Frame layout (5 bytes of envelope + payload):
//!
//! ```text
//! +-------------+-----------+------------------+
//! | length L    | type code | payload          |
//! | 4 bytes BE  | 1 byte    | L - 1 bytes      |
//! +-------------+-----------+------------------+
//! ```
//!
//! The length counts the type-code byte plus the payload. A request and
//! every response frame use the same envelope.

use crate::error::ProtocolError;
use crate::MAX_FRAME_LEN;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the big-endian length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// A complete frame: one type-tagged unit on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message-type code.
    pub code: u8,
    /// Payload bytes (codec-owned structure).
    pub payload: Bytes,
}

impl Frame {
    pub fn new(code: u8, payload: Bytes) -> Self {
        Self { code, payload }
    }

    /// Encodes the frame into length-prefixed bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let len = self.payload.len() as u32 + 1;
        if len > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_LEN,
            });
        }

        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_LEN + len as usize);
        buf.put_u32(len);
        buf.put_u8(self.code);
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    /// Decodes one frame from the front of `buf`.
    ///
    /// Returns `Ok(Some(frame))` when a complete frame was consumed,
    /// `Ok(None)` when more bytes are needed, or `Err` on a corrupt length.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        // Peek at the length without consuming.
        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if len == 0 {
            return Err(ProtocolError::InvalidLength(0));
        }
        if len > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_LEN,
            });
        }

        if buf.len() < LENGTH_PREFIX_LEN + len as usize {
            return Ok(None);
        }

        buf.advance(LENGTH_PREFIX_LEN);
        let code = buf[0];
        buf.advance(1);
        let payload = buf.split_to(len as usize - 1).freeze();

        Ok(Some(Self { code, payload }))
    }
}

/// Reassembles raw socket chunks into complete frames.
///
/// Chunks may carry any slice of the byte stream: a fraction of one frame,
/// several frames, or a tail that ends mid-frame. Bytes that do not yet form
/// a complete frame (including a partially received length prefix) stay
/// buffered until a later chunk completes them, so the emitted frame
/// sequence is identical for every chunking of the same stream.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    buffer: BytesMut,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Consumes one chunk and returns every frame it completed (possibly
    /// none). A framing error poisons the byte stream; the caller must
    /// discard the connection.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, ProtocolError> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(frame) = Frame::decode(&mut self.buffer)? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Returns the number of bytes buffered for an incomplete frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discards any partial frame. Call on disconnect; reassembly state is
    /// meaningless across connections.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
