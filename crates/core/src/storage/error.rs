//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File size exceeds maximum allowed.
    #[error("file size {size} bytes exceeds maximum allowed {max} bytes")]
    FileTooLarge {
        /// Actual file size.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// Object not found in storage.
    #[error("object not found: {key}")]
    NotFound {
        /// Storage key that was not found.
        key: String,
    },

    /// Invalid object key.
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// Invalid bucket name.
    #[error("invalid bucket name: {0}")]
    InvalidBucket(String),

    /// Requested presign lifetime outside the accepted range.
    #[error("expiry of {requested} seconds exceeds maximum {max} seconds")]
    InvalidExpiry {
        /// Requested lifetime.
        requested: u64,
        /// Maximum accepted lifetime.
        max: u64,
    },

    /// Presign operation not supported by provider.
    #[error("presign operation not supported by storage provider")]
    PresignNotSupported,

    /// Operation not supported by provider.
    #[error("{0} is not supported by storage provider")]
    Unsupported(&'static str),

    /// Storage provider configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// Backend operation error.
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    /// Create a file too large error.
    #[must_use]
    pub fn file_too_large(size: u64, max: u64) -> Self {
        Self::FileTooLarge { size, max }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an operation error.
    #[must_use]
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// Map an OpenDAL error for the given key.
    #[must_use]
    pub fn from_opendal(err: &opendal::Error, key: &str) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::not_found(key),
            opendal::ErrorKind::Unsupported => Self::Unsupported("this operation"),
            opendal::ErrorKind::ConfigInvalid => Self::configuration(err.to_string()),
            _ => Self::operation(err.to_string()),
        }
    }

    /// Map an OpenDAL error raised while presigning `key`.
    #[must_use]
    pub fn from_opendal_presign(err: &opendal::Error, key: &str) -> Self {
        match err.kind() {
            opendal::ErrorKind::Unsupported => Self::PresignNotSupported,
            _ => Self::from_opendal(err, key),
        }
    }
}
