//! Security error types.

use gridwire_protocol::ErrorCode;
use thiserror::Error;

/// Errors raised while authenticating, authorizing or post-processing.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("{principal} not authorized for {permission}")]
    NotAuthorized {
        principal: String,
        permission: String,
    },

    #[error("{0}")]
    AuthenticationFailed(String),

    #[error("Unable to process authentication credentials.")]
    MalformedCredentials,

    #[error("unknown {kind} '{name}'")]
    UnknownComponent { kind: &'static str, name: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("security configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SecurityError {
    /// Converts to protocol error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            SecurityError::NotAuthorized { .. } => ErrorCode::NotAuthorized,
            SecurityError::AuthenticationFailed(_) => ErrorCode::AuthenticationFailed,
            SecurityError::MalformedCredentials => ErrorCode::MalformedCredentials,
            SecurityError::Serialization(_) => ErrorCode::SerializationError,
            SecurityError::UnknownComponent { .. }
            | SecurityError::Config(_)
            | SecurityError::Io(_) => ErrorCode::InternalError,
        }
    }
}
