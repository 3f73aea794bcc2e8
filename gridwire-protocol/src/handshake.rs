//! Handshake and authentication exchange messages.
//!
//! Every string field is a `u32` big-endian length followed by that many UTF-8
//! bytes. A handshake request carries exactly four fields:
//!
//! ```text
//! version | correlation_id | client_id | mechanisms (comma separated)
//! ```
//!
//! Replies start with a status byte.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Number of fields in a handshake request.
pub const HANDSHAKE_FIELD_COUNT: usize = 4;

const STATUS_OK: u8 = 0;
const STATUS_FAILED: u8 = 1;
const STATUS_CONTINUE: u8 = 2;

fn put_field(buf: &mut BytesMut, field: &[u8]) {
    buf.put_u32(field.len() as u32);
    buf.put_slice(field);
}

fn take_raw_field(buf: &mut &[u8]) -> Result<Bytes, ProtocolError> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::MalformedHandshake(format!(
            "field length needs 4 bytes, {} remaining",
            buf.remaining()
        )));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(ProtocolError::MalformedHandshake(format!(
            "field declares {} bytes, {} remaining",
            len,
            buf.remaining()
        )));
    }
    let field = Bytes::copy_from_slice(&buf[..len]);
    buf.advance(len);
    Ok(field)
}

fn take_field(buf: &mut &[u8], name: &'static str) -> Result<String, ProtocolError> {
    let raw = take_raw_field(buf)?;
    String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8(name))
}

/// Splits a body into length-prefixed string fields.
pub fn decode_fields(body: &[u8]) -> Result<Vec<String>, ProtocolError> {
    let mut buf = body;
    let mut fields = Vec::new();
    while buf.has_remaining() {
        fields.push(take_field(&mut buf, "handshake field")?);
    }
    Ok(fields)
}

/// Handshake request sent by the client as its first frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub version: String,
    pub correlation_id: String,
    pub client_id: String,
    /// Offered mechanisms in client preference order.
    pub mechanisms: Vec<String>,
}

impl HandshakeRequest {
    pub fn new(
        version: impl Into<String>,
        correlation_id: impl Into<String>,
        client_id: impl Into<String>,
        mechanisms: Vec<String>,
    ) -> Self {
        Self {
            version: version.into(),
            correlation_id: correlation_id.into(),
            client_id: client_id.into(),
            mechanisms,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        put_field(&mut buf, self.version.as_bytes());
        put_field(&mut buf, self.correlation_id.as_bytes());
        put_field(&mut buf, self.client_id.as_bytes());
        put_field(&mut buf, self.mechanisms.join(",").as_bytes());
        buf.freeze()
    }

    /// Reads only the leading version field.
    ///
    /// Lets a server reject a foreign version before looking at the rest of
    /// the request.
    pub fn peek_version(body: &[u8]) -> Option<String> {
        let mut buf = body;
        take_field(&mut buf, "version").ok()
    }

    /// Decodes a request holding exactly four fields.
    pub fn decode(body: &[u8]) -> Result<Self, ProtocolError> {
        let fields = decode_fields(body)?;
        if fields.len() != HANDSHAKE_FIELD_COUNT {
            return Err(ProtocolError::MalformedHandshake(format!(
                "expected {} fields, got {}",
                HANDSHAKE_FIELD_COUNT,
                fields.len()
            )));
        }

        let mut fields = fields.into_iter();
        let mut next = || fields.next().unwrap_or_default();
        let version = next();
        let correlation_id = next();
        let client_id = next();
        let mechanisms = next()
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            version,
            correlation_id,
            client_id,
            mechanisms,
        })
    }
}

/// Successful handshake reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub correlation_id: String,
    pub mechanism: String,
}

/// Server reply to a handshake request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeReply {
    Accepted(HandshakeResponse),
    Rejected { message: String },
}

impl HandshakeReply {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            HandshakeReply::Accepted(response) => {
                buf.put_u8(STATUS_OK);
                put_field(&mut buf, response.correlation_id.as_bytes());
                put_field(&mut buf, response.mechanism.as_bytes());
            }
            HandshakeReply::Rejected { message } => {
                buf.put_u8(STATUS_FAILED);
                put_field(&mut buf, message.as_bytes());
            }
        }
        buf.freeze()
    }

    pub fn decode(body: &[u8]) -> Result<Self, ProtocolError> {
        let mut buf = body;
        if !buf.has_remaining() {
            return Err(ProtocolError::MalformedHandshake(
                "empty handshake reply".to_string(),
            ));
        }
        match buf.get_u8() {
            STATUS_OK => {
                let correlation_id = take_field(&mut buf, "correlation id")?;
                let mechanism = take_field(&mut buf, "mechanism")?;
                Ok(HandshakeReply::Accepted(HandshakeResponse {
                    correlation_id,
                    mechanism,
                }))
            }
            STATUS_FAILED => Ok(HandshakeReply::Rejected {
                message: take_field(&mut buf, "message")?,
            }),
            other => Err(ProtocolError::MalformedHandshake(format!(
                "unknown handshake status {}",
                other
            ))),
        }
    }
}

/// Server reply to one step of the authentication exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthReply {
    /// Authentication finished. The challenge is usually empty.
    Complete { challenge: Bytes },
    /// The mechanism needs another client response.
    Continue { challenge: Bytes },
    Failed { message: String },
}

impl AuthReply {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            AuthReply::Complete { challenge } => {
                buf.put_u8(STATUS_OK);
                put_field(&mut buf, challenge);
            }
            AuthReply::Continue { challenge } => {
                buf.put_u8(STATUS_CONTINUE);
                put_field(&mut buf, challenge);
            }
            AuthReply::Failed { message } => {
                buf.put_u8(STATUS_FAILED);
                put_field(&mut buf, message.as_bytes());
            }
        }
        buf.freeze()
    }

    pub fn decode(body: &[u8]) -> Result<Self, ProtocolError> {
        let mut buf = body;
        if !buf.has_remaining() {
            return Err(ProtocolError::MalformedHandshake(
                "empty authentication reply".to_string(),
            ));
        }
        match buf.get_u8() {
            STATUS_OK => Ok(AuthReply::Complete {
                challenge: take_raw_field(&mut buf)?,
            }),
            STATUS_CONTINUE => Ok(AuthReply::Continue {
                challenge: take_raw_field(&mut buf)?,
            }),
            STATUS_FAILED => Ok(AuthReply::Failed {
                message: take_field(&mut buf, "message")?,
            }),
            other => Err(ProtocolError::MalformedHandshake(format!(
                "unknown authentication status {}",
                other
            ))),
        }
    }
}
