//! Error types for background removal requests

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Closed set of failures a request can end in
///
/// Every variant maps to exactly one HTTP status in `server::error`.
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Bad or missing caller input (non-image upload, missing field, bad quality)
    #[error("{0}")]
    Validation(String),

    /// Upload body larger than the configured limit
    #[error("Upload exceeds the limit of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// Uploaded bytes could not be decoded into a bitmap
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Encoder library failure while serializing the result
    #[error("Failed to encode {format} image: {message}")]
    Encode { format: String, message: String },

    /// Domain failure signaled by the local or remote backend
    #[error("{0}")]
    Processing(String),

    /// Unexpected failure while dispatching to a backend
    #[error("Processing failed: {0}")]
    Internal(String),

    /// Remote usage lookup failed
    #[error("Failed to fetch usage: {0}")]
    UsageQuery(String),

    /// Invalid service configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input/output errors (binding the listener, reading the model file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BgRemovalError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new upload size error
    pub fn payload_too_large(limit: u64) -> Self {
        Self::PayloadTooLarge { limit }
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new encode error for the given format label
    pub fn encode<F: Into<String>, S: Into<String>>(format: F, msg: S) -> Self {
        Self::Encode {
            format: format.into(),
            message: msg.into(),
        }
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a new usage query error
    pub fn usage_query<S: Into<String>>(msg: S) -> Self {
        Self::UsageQuery(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Whether the failure was caused by the caller's input
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Decode(_) | Self::PayloadTooLarge { .. }
        )
    }
}

/// Failure reported by a removal collaborator (local model or remote API)
///
/// The dispatcher turns `Removal` into [`BgRemovalError::Processing`] and
/// `Unexpected` into [`BgRemovalError::Internal`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Domain failure: model error, rejected credential, network failure
    #[error("{0}")]
    Removal(String),

    /// Anything the backend did not anticipate
    #[error("{0}")]
    Unexpected(String),
}

impl BackendError {
    pub fn removal<S: Into<String>>(msg: S) -> Self {
        Self::Removal(msg.into())
    }

    pub fn unexpected<S: Into<String>>(msg: S) -> Self {
        Self::Unexpected(msg.into())
    }
}
