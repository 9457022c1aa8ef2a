//! CLI-specific error types
//!
//! Every CLI error is fatal: `main` prints `CODE: message` and exits 1.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::evaluator::EvalError;
use crate::executor::ExecError;
use crate::source::SourceError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Bad or missing arguments (no query)
    Usage,
    /// Evaluator binary missing or not runnable
    Startup,
    /// Config file or flag values invalid
    Config,
    /// An input file does not exist
    SourceNotFound,
    /// The run failed (strict partition failure, unreadable input)
    Execution,
    /// Writing output failed
    Io,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::Usage => "JQP_CLI_USAGE",
            Self::Startup => "JQP_CLI_STARTUP",
            Self::Config => "JQP_CLI_CONFIG",
            Self::SourceNotFound => "JQP_CLI_SOURCE_NOT_FOUND",
            Self::Execution => "JQP_CLI_EXECUTION",
            Self::Io => "JQP_CLI_IO",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::Usage, msg)
    }

    pub fn missing_query() -> Self {
        Self::usage("No query given. Usage: jqpar [FLAGS] QUERY [FILE...]")
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::Io, msg)
    }

    /// Get the error code
    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::new(CliErrorCode::Config, format!("{} ({})", e, e.code()))
    }
}

impl From<SourceError> for CliError {
    fn from(e: SourceError) -> Self {
        let code = match e {
            SourceError::NotFound(_) => CliErrorCode::SourceNotFound,
            SourceError::Io { .. } => CliErrorCode::Execution,
        };
        Self::new(code, e.to_string())
    }
}

impl From<EvalError> for CliError {
    fn from(e: EvalError) -> Self {
        let code = if e.is_startup() {
            CliErrorCode::Startup
        } else {
            CliErrorCode::Execution
        };
        Self::new(code, e.to_string())
    }
}

impl From<ExecError> for CliError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::Source(inner) => inner.into(),
            ExecError::Sink(inner) => inner.into(),
            other => Self::new(
                CliErrorCode::Execution,
                format!("{} ({})", other, other.code()),
            ),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
