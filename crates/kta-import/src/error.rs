//! Errors that abort an import

use crate::sink::SinkError;
use crate::source::SourceError;
use thiserror::Error;

/// Result type for import operations
pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] kta_common::KtaError),

    #[error(transparent)]
    Source(#[from] SourceError),

    /// Only fatal store errors get this far
    #[error(transparent)]
    Sink(#[from] SinkError),
}
