//! Configuration errors
//!
//! All configuration errors are fatal: the process exits before any query runs.

use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Invalid config JSON: {0}")]
    InvalidJson(String),

    #[error("Invalid block size '{0}': expected bytes or a K/M/G suffix")]
    InvalidBlockSize(String),

    #[error("Block size must be > 0")]
    ZeroBlockSize,

    #[error("Worker count must be > 0")]
    ZeroWorkers,
}

impl ConfigError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Unreadable { .. } => "JQP_CONFIG_UNREADABLE",
            ConfigError::InvalidJson(_) => "JQP_CONFIG_INVALID",
            ConfigError::InvalidBlockSize(_) | ConfigError::ZeroBlockSize => {
                "JQP_CONFIG_BLOCK_SIZE"
            }
            ConfigError::ZeroWorkers => "JQP_CONFIG_WORKERS",
        }
    }
}
