//! # gridwire-protocol
//!
//! Wire protocol for the gridwire client gateway.
//!
//! This crate provides:
//! - Length-prefixed framing over async streams and byte buffers
//! - The message envelope (correlation id, message kind, payload)
//! - Typed request/response payloads for every operation
//! - Handshake and authentication exchange messages
//! - The native [`Value`] model and the [`CodecRegistry`] that maps wire
//!   encoding tags to values
//! - Error codes and protocol constants

pub mod codec;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod message;
pub mod serialization;
pub mod value;

pub use codec::{decode_envelope, Decoder, Encoder, ENVELOPE_HEADER_SIZE};
pub use error::{CodecError, ErrorCode, ProtocolError};
pub use frame::{read_frame, write_frame, Frame, FRAME_HEADER_SIZE};
pub use handshake::{AuthReply, HandshakeReply, HandshakeRequest, HandshakeResponse};
pub use message::{
    ErrorResponse, GetAllRequest, GetAllResponse, GetRegionNamesRequest, GetRegionNamesResponse,
    GetRequest, GetResponse, Message, MessageHeader, MessageKind, PutAllRequest, PutAllResponse,
    PutRequest, PutResponse, RemoveRequest, RemoveResponse, RequestKind, RequestMessage,
};
pub use serialization::{CodecRegistry, TypeCodec};
pub use value::{EncodedValue, EncodingType, Entry, Value};

/// Protocol version supported by this implementation.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Default port for the gateway.
pub const DEFAULT_PORT: u16 = 40404;

/// Maximum frame body size (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Authentication mechanism carrying `authzid NUL username NUL password`.
pub const PLAIN_MECHANISM: &str = "PLAIN";

/// Communication-mode bytes read at the start of every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtocolSelector {
    /// Legacy client/server protocol. Not served by the gateway.
    Legacy = 100,
    /// The gateway protocol.
    Gateway = 110,
}

impl TryFrom<u8> for ProtocolSelector {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            100 => Ok(ProtocolSelector::Legacy),
            110 => Ok(ProtocolSelector::Gateway),
            other => Err(other),
        }
    }
}
