//! Evaluator errors

use std::io;

use thiserror::Error;

/// Result type for evaluator operations
pub type EvalResult<T> = Result<T, EvalError>;

/// Evaluator errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The evaluator binary cannot be started at all
    #[error("Evaluator '{program}' is not available: {reason}")]
    Unavailable { program: String, reason: String },

    /// Feeding input or reading output failed
    #[error("Evaluator I/O failed: {0}")]
    Io(String),

    /// The evaluator ran and exited unsuccessfully
    #[error("Evaluator exited with {}: {stderr}", status_label(.status))]
    Failed { status: Option<i32>, stderr: String },

    /// The filter is outside what this evaluator understands
    #[error("Unsupported filter: {0}")]
    Unsupported(String),

    /// The input chunk is not line-delimited JSON
    #[error("Invalid input record: {0}")]
    InvalidInput(String),

    /// The consumer of streamed output refused a line
    #[error("Writing evaluator output failed: {reason}")]
    Output { kind: io::ErrorKind, reason: String },
}

fn status_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "signal".to_string(),
    }
}

impl EvalError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            EvalError::Unavailable { .. } => "JQP_EVALUATOR_UNAVAILABLE",
            EvalError::Io(_) => "JQP_EVALUATOR_IO",
            EvalError::Failed { .. } => "JQP_EVALUATOR_FAILED",
            EvalError::Unsupported(_) => "JQP_EVALUATOR_UNSUPPORTED",
            EvalError::InvalidInput(_) => "JQP_EVALUATOR_INVALID_INPUT",
            EvalError::Output { .. } => "JQP_EVALUATOR_OUTPUT",
        }
    }

    /// Wraps a write error raised by the output consumer
    pub fn output(err: io::Error) -> Self {
        EvalError::Output {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }

    /// Startup errors abort before any query runs
    pub fn is_startup(&self) -> bool {
        matches!(self, EvalError::Unavailable { .. })
    }
}
