//! Server error types.

use gridwire_protocol::{CodecError, ErrorCode, ProtocolError, RequestKind};
use gridwire_security::SecurityError;
use gridwire_store::StoreError;
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Security(#[from] SecurityError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Region passed by client did not exist: {0}")]
    RegionNotFound(String),

    #[error("no handler registered for {0}")]
    HandlerNotRegistered(RequestKind),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Converts to protocol error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ServerError::Io(_) => ErrorCode::InternalError,
            ServerError::Protocol(e) => e.error_code(),
            ServerError::Codec(e) => e.error_code(),
            ServerError::Store(e) => e.error_code(),
            ServerError::Security(e) => e.error_code(),
            ServerError::Json(_) => ErrorCode::BadRequest,
            ServerError::RegionNotFound(_) => ErrorCode::RegionNotFound,
            ServerError::HandlerNotRegistered(_) => ErrorCode::InternalError,
            ServerError::InvalidRequest(_) => ErrorCode::BadRequest,
            ServerError::HandshakeTimeout => ErrorCode::MalformedHandshake,
            ServerError::ShuttingDown => ErrorCode::InternalError,
        }
    }

    /// Returns whether this error must close the connection.
    pub fn is_connection_fatal(&self) -> bool {
        match self {
            ServerError::Io(_)
            | ServerError::Protocol(ProtocolError::Io(_))
            | ServerError::HandshakeTimeout
            | ServerError::ShuttingDown => true,
            other => other.error_code().is_connection_fatal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_errors_keep_connection() {
        let errors = [
            ServerError::RegionNotFound("r".into()),
            ServerError::Codec(CodecError::UnsupportedEncoding(42)),
            ServerError::Security(SecurityError::NotAuthorized {
                principal: "p".into(),
                permission: "DATA:READ".into(),
            }),
            ServerError::HandlerNotRegistered(RequestKind::Unset),
        ];
        for err in errors {
            assert!(!err.is_connection_fatal(), "{} should not be fatal", err);
        }
    }

    #[test]
    fn test_fatal_errors() {
        let errors = [
            ServerError::Protocol(ProtocolError::TruncatedFrame {
                expected: 4,
                received: 1,
            }),
            ServerError::Security(SecurityError::MalformedCredentials),
            ServerError::HandshakeTimeout,
            ServerError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe)),
        ];
        for err in errors {
            assert!(err.is_connection_fatal(), "{} should be fatal", err);
        }
    }

    #[test]
    fn test_region_not_found_message() {
        let err = ServerError::RegionNotFound("orders".into());
        assert_eq!(err.error_code(), ErrorCode::RegionNotFound);
        assert_eq!(
            err.to_string(),
            "Region passed by client did not exist: orders"
        );
    }
}
