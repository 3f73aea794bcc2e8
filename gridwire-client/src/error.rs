//! Client error types.

use gridwire_protocol::{CodecError, ErrorCode, ProtocolError};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("server error: {code} - {message}")]
    ServerError { code: ErrorCode, message: String },

    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ClientError {
    /// Returns the server's error code, if the server answered with one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::ServerError { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns whether the connection is still usable after this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::ServerError { code, .. } => !code.is_connection_fatal(),
            ClientError::Codec(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let denied = ClientError::ServerError {
            code: ErrorCode::NotAuthorized,
            message: "denied".into(),
        };
        assert!(denied.is_recoverable());
        assert_eq!(denied.code(), Some(ErrorCode::NotAuthorized));

        let framing = ClientError::ServerError {
            code: ErrorCode::FrameTooLarge,
            message: "too big".into(),
        };
        assert!(!framing.is_recoverable());
        assert!(!ClientError::ConnectionClosed.is_recoverable());
        assert_eq!(ClientError::Timeout.code(), None);
    }
}
