//! Protocol error types and error codes.

use crate::value::EncodingType;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Protocol-level errors that can occur during framing, envelope handling or
/// the handshake exchange.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("truncated frame: expected {expected} bytes, stream ended after {received}")]
    TruncatedFrame { expected: usize, received: usize },

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("unknown message kind {kind:#06x} (correlation id {correlation_id})")]
    UnknownMessageKind { correlation_id: i32, kind: u16 },

    #[error("unsupported protocol version: expected '{expected}', got '{actual}'")]
    UnsupportedVersion { expected: String, actual: String },

    #[error("malformed handshake: {0}")]
    MalformedHandshake(String),

    #[error("No mutually agreed upon mechanism")]
    NoAgreedMechanism,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
}

impl ProtocolError {
    /// Maps this error to its stable wire code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ProtocolError::TruncatedFrame { .. } => ErrorCode::TruncatedFrame,
            ProtocolError::FrameTooLarge { .. } => ErrorCode::FrameTooLarge,
            ProtocolError::MalformedMessage(_) => ErrorCode::MalformedMessage,
            ProtocolError::UnknownMessageKind { .. } => ErrorCode::BadRequest,
            ProtocolError::UnsupportedVersion { .. } => ErrorCode::UnsupportedVersion,
            ProtocolError::MalformedHandshake(_) => ErrorCode::MalformedHandshake,
            ProtocolError::NoAgreedMechanism => ErrorCode::NoAgreedMechanism,
            ProtocolError::Json(_) => ErrorCode::BadRequest,
            ProtocolError::Io(_) => ErrorCode::InternalError,
            ProtocolError::InvalidUtf8(_) => ErrorCode::MalformedHandshake,
        }
    }
}

/// Errors raised by the codec registry while converting between wire bytes
/// and native values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("encoding type {0} is not supported")]
    UnsupportedEncoding(u8),

    #[error("no codec registered for encoding type {0}")]
    CodecNotRegistered(EncodingType),

    #[error("codec already registered for encoding type {0}")]
    CodecAlreadyRegistered(EncodingType),

    #[error("codec for {expected} cannot encode a {actual} value")]
    TypeMismatch {
        expected: EncodingType,
        actual: EncodingType,
    },

    #[error("malformed {encoding_type} value: {reason}")]
    Malformed {
        encoding_type: EncodingType,
        reason: String,
    },
}

impl CodecError {
    /// Maps this error to its stable wire code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            CodecError::UnsupportedEncoding(_) => ErrorCode::UnsupportedEncoding,
            CodecError::CodecNotRegistered(_) | CodecError::CodecAlreadyRegistered(_) => {
                ErrorCode::CodecNotRegistered
            }
            CodecError::TypeMismatch { .. } | CodecError::Malformed { .. } => {
                ErrorCode::UnsupportedEncoding
            }
        }
    }
}

/// Stable error codes returned in error responses and handshake failures.
///
/// These codes are part of the protocol contract and must remain stable
/// across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Framing errors
    TruncatedFrame,
    FrameTooLarge,
    MalformedMessage,

    // Handshake errors
    UnsupportedVersion,
    MalformedHandshake,
    NoAgreedMechanism,

    // Authentication errors
    MalformedCredentials,
    AuthenticationFailed,

    // Authorization errors
    NotAuthorized,

    // Operation errors
    RegionNotFound,
    ConstraintViolation,
    UnsupportedEncoding,
    CodecNotRegistered,
    BadRequest,
    SerializationError,

    // Dispatch errors
    InternalError,
}

impl ErrorCode {
    /// Returns whether an error of this class must close the connection.
    ///
    /// Authorization and operation errors fail only the current request.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            ErrorCode::TruncatedFrame
                | ErrorCode::FrameTooLarge
                | ErrorCode::MalformedMessage
                | ErrorCode::UnsupportedVersion
                | ErrorCode::MalformedHandshake
                | ErrorCode::NoAgreedMechanism
                | ErrorCode::MalformedCredentials
                | ErrorCode::AuthenticationFailed
        )
    }

    /// Returns the wire name of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TruncatedFrame => "TRUNCATED_FRAME",
            ErrorCode::FrameTooLarge => "FRAME_TOO_LARGE",
            ErrorCode::MalformedMessage => "MALFORMED_MESSAGE",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::MalformedHandshake => "MALFORMED_HANDSHAKE",
            ErrorCode::NoAgreedMechanism => "NO_AGREED_MECHANISM",
            ErrorCode::MalformedCredentials => "MALFORMED_CREDENTIALS",
            ErrorCode::AuthenticationFailed => "AUTHENTICATION_FAILED",
            ErrorCode::NotAuthorized => "NOT_AUTHORIZED",
            ErrorCode::RegionNotFound => "REGION_NOT_FOUND",
            ErrorCode::ConstraintViolation => "CONSTRAINT_VIOLATION",
            ErrorCode::UnsupportedEncoding => "UNSUPPORTED_ENCODING",
            ErrorCode::CodecNotRegistered => "CODEC_NOT_REGISTERED",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::SerializationError => "SERIALIZATION_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
