//! Store error types.

use gridwire_protocol::{EncodingType, ErrorCode};
use thiserror::Error;

/// Errors from the backing store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("region not found: {0}")]
    RegionNotFound(String),

    #[error("region already exists: {0}")]
    RegionExists(String),

    #[error("region {region} only accepts {expected} {role}s, got {actual}")]
    ConstraintViolation {
        region: String,
        role: &'static str,
        expected: EncodingType,
        actual: EncodingType,
    },
}

impl StoreError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            StoreError::RegionNotFound(_) => ErrorCode::RegionNotFound,
            StoreError::RegionExists(_) => ErrorCode::BadRequest,
            StoreError::ConstraintViolation { .. } => ErrorCode::ConstraintViolation,
        }
    }
}
