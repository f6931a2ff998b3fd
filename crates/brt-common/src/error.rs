//! Error types for BRT

use thiserror::Error;

/// Result type alias for BRT operations
pub type Result<T> = std::result::Result<T, BrtError>;

/// Main error type for BRT
#[derive(Error, Debug)]
pub enum BrtError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid snapshot shape: {0}")]
    InvalidShape(String),
}

impl BrtError {
    /// Create a shape error with context
    pub fn invalid_shape(message: impl Into<String>) -> Self {
        Self::InvalidShape(message.into())
    }
}
