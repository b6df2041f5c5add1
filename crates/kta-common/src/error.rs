//! Error types shared across the KTA workspace

use thiserror::Error;

/// Result type alias for KTA operations
pub type Result<T> = std::result::Result<T, KtaError>;

/// Main error type for KTA
#[derive(Error, Debug)]
pub enum KtaError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KtaError {
    /// Shorthand for a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        KtaError::Config(msg.into())
    }
}
