//! Encoder and decoder for message envelopes.
//!
//! Envelope layout inside a frame body:
//!
//! ```text
//! +----------------+--------+-----------------+
//! | correlation_id |  kind  |     payload     |
//! |  i32, 4 bytes  | 2 bytes|  rest of body   |
//! +----------------+--------+-----------------+
//! ```

use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::message::{Message, MessageHeader, MessageKind};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the envelope header in bytes.
pub const ENVELOPE_HEADER_SIZE: usize = 6;

/// Encodes messages into frame bodies and frames.
pub struct Encoder;

impl Encoder {
    /// Encodes a message into a frame body.
    pub fn encode_message(message: &Message) -> Bytes {
        let mut buf = BytesMut::with_capacity(ENVELOPE_HEADER_SIZE + message.payload.len());
        buf.put_i32(message.header.correlation_id);
        buf.put_u16(message.header.kind.code());
        buf.put_slice(&message.payload);
        buf.freeze()
    }

    /// Encodes a message into a complete length-prefixed frame.
    pub fn encode_frame(message: &Message) -> Result<BytesMut, ProtocolError> {
        Frame::new(Self::encode_message(message)).encode()
    }
}

/// Parses a frame body into a message.
///
/// A body shorter than the envelope header is [`ProtocolError::MalformedMessage`].
/// An unrecognised kind is [`ProtocolError::UnknownMessageKind`] carrying the
/// correlation id so the caller can answer it.
pub fn decode_envelope(body: &[u8]) -> Result<Message, ProtocolError> {
    if body.len() < ENVELOPE_HEADER_SIZE {
        return Err(ProtocolError::MalformedMessage(format!(
            "envelope needs {} header bytes, got {}",
            ENVELOPE_HEADER_SIZE,
            body.len()
        )));
    }

    let mut buf = body;
    let correlation_id = buf.get_i32();
    let code = buf.get_u16();
    let kind = MessageKind::from_code(code).ok_or(ProtocolError::UnknownMessageKind {
        correlation_id,
        kind: code,
    })?;

    Ok(Message {
        header: MessageHeader {
            correlation_id,
            kind,
        },
        payload: Bytes::copy_from_slice(buf),
    })
}

/// Incremental decoder for callers that read the stream in chunks.
pub struct Decoder {
    buffer: BytesMut,
    max_frame_bytes: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_limit(crate::MAX_FRAME_SIZE)
    }

    pub fn with_limit(max_frame_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            max_frame_bytes,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame from the buffer.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode_with_limit(&mut self.buffer, self.max_frame_bytes)
    }

    /// Attempts to decode the next message from the buffer.
    pub fn decode_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        match self.decode_frame()? {
            Some(frame) => Ok(Some(decode_envelope(&frame.body)?)),
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
