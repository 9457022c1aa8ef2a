//! Record source errors

use std::path::PathBuf;

use thiserror::Error;

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Record source errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// A file argument does not exist. Raised before any input is processed.
    #[error("No such file: {}", .0.display())]
    NotFound(PathBuf),

    /// Reading the source failed
    #[error("Failed to read {label}: {reason}")]
    Io { label: String, reason: String },
}

impl SourceError {
    /// Wraps an I/O error with the source label
    pub fn io(label: impl Into<String>, err: std::io::Error) -> Self {
        SourceError::Io {
            label: label.into(),
            reason: err.to_string(),
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            SourceError::NotFound(_) => "JQP_SOURCE_NOT_FOUND",
            SourceError::Io { .. } => "JQP_SOURCE_IO",
        }
    }
}
