//! Executor errors
//!
//! Error codes:
//! - JQP_EXEC_SOURCE (reading the input failed)
//! - JQP_EXEC_PARTITION_FAILED (a partition failed under the abort policy)
//! - JQP_EXEC_EVALUATION (the single sequential invocation failed)
//! - JQP_EXEC_SINK (writing output failed)
//! - JQP_EXEC_RUNTIME (the worker pool could not start or a task panicked)

use thiserror::Error;

use crate::evaluator::EvalError;
use crate::source::SourceError;

/// Result type for executor operations
pub type ExecResult<T> = Result<T, ExecError>;

/// Executor errors
#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Partition {seq} failed: {source}")]
    PartitionFailed {
        seq: u64,
        #[source]
        source: EvalError,
    },

    #[error("Evaluation failed: {0}")]
    Evaluation(#[from] EvalError),

    #[error("Failed to write output: {0}")]
    Sink(#[from] std::io::Error),

    #[error("Worker pool failure: {0}")]
    Runtime(String),
}

impl ExecError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ExecError::Source(_) => "JQP_EXEC_SOURCE",
            ExecError::PartitionFailed { .. } => "JQP_EXEC_PARTITION_FAILED",
            ExecError::Evaluation(_) => "JQP_EXEC_EVALUATION",
            ExecError::Sink(_) => "JQP_EXEC_SINK",
            ExecError::Runtime(_) => "JQP_EXEC_RUNTIME",
        }
    }

    /// Returns true when stdout went away (e.g. piped into `head`)
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, ExecError::Sink(e) if e.kind() == std::io::ErrorKind::BrokenPipe)
    }
}
