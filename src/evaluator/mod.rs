//! Evaluator seam
//!
//! The JSON query evaluator is an external collaborator. Executors only see
//! the [`Evaluator`] trait: one call per chunk of line-delimited JSON, with a
//! typed [`Invocation`] instead of a shell command string.
//!
//! Sequential runs use [`Evaluator::evaluate_stream`] instead, which feeds an
//! entire source and hands output lines over as they appear.
//!
//! - [`JqEvaluator`] drives an external `jq` executable
//! - [`ScriptedEvaluator`] evaluates a small filter subset in-process

mod errors;
mod jq;
mod scripted;

use std::io::{self, Read};
use std::sync::Arc;

use crate::source::SourceReader;

pub use errors::{EvalError, EvalResult};
pub use jq::{EvaluatorOptions, JqEvaluator};
pub use scripted::ScriptedEvaluator;

/// How the evaluator should render its output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    /// Honour the user's output options (raw, compact, tab, ...)
    Passthrough,
    /// One compact JSON value per line, ignoring user output options
    Compact,
}

/// Typed parameters for one evaluator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    filter: Arc<str>,
    style: OutputStyle,
}

impl Invocation {
    /// Invocation whose output goes straight to the user
    pub fn passthrough(filter: impl Into<Arc<str>>) -> Self {
        Self {
            filter: filter.into(),
            style: OutputStyle::Passthrough,
        }
    }

    /// Invocation whose output is consumed by a reducer
    pub fn compact(filter: impl Into<Arc<str>>) -> Self {
        Self {
            filter: filter.into(),
            style: OutputStyle::Compact,
        }
    }

    /// The filter expression
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// The requested output style
    pub fn style(&self) -> OutputStyle {
        self.style
    }
}

/// Black-box evaluator: `evaluate(filter, chunk) -> output lines`.
///
/// Implementations must be callable concurrently from worker threads.
pub trait Evaluator: Send + Sync {
    /// Evaluates the invocation over one chunk of line-delimited JSON.
    fn evaluate(&self, invocation: &Invocation, input: &[u8]) -> EvalResult<Vec<String>>;

    /// Evaluates the invocation over a whole stream, passing each output line
    /// to `emit` as soon as it is available.
    ///
    /// A line `emit` refuses ends the evaluation with [`EvalError::Output`].
    /// The default buffers the stream and delegates to [`Evaluator::evaluate`].
    fn evaluate_stream(
        &self,
        invocation: &Invocation,
        mut input: SourceReader,
        emit: &mut dyn FnMut(&str) -> io::Result<()>,
    ) -> EvalResult<()> {
        let mut data = Vec::new();
        input
            .read_to_end(&mut data)
            .map_err(|e| EvalError::Io(e.to_string()))?;
        for line in self.evaluate(invocation, &data)? {
            emit(&line).map_err(EvalError::output)?;
        }
        Ok(())
    }
}

impl<E: Evaluator + ?Sized> Evaluator for Arc<E> {
    fn evaluate(&self, invocation: &Invocation, input: &[u8]) -> EvalResult<Vec<String>> {
        (**self).evaluate(invocation, input)
    }

    fn evaluate_stream(
        &self,
        invocation: &Invocation,
        input: SourceReader,
        emit: &mut dyn FnMut(&str) -> io::Result<()>,
    ) -> EvalResult<()> {
        (**self).evaluate_stream(invocation, input, emit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_styles() {
        let pass = Invocation::passthrough("select(.a)");
        assert_eq!(pass.filter(), "select(.a)");
        assert_eq!(pass.style(), OutputStyle::Passthrough);

        let compact = Invocation::compact(String::from(".a"));
        assert_eq!(compact.style(), OutputStyle::Compact);
    }

    #[test]
    fn test_arc_evaluator_delegates() {
        let evaluator: Arc<dyn Evaluator> = Arc::new(ScriptedEvaluator::new());
        let out = evaluator
            .evaluate(&Invocation::compact(".v"), b"{\"v\":1}\n{\"v\":2}\n")
            .unwrap();
        assert_eq!(out, vec!["1", "2"]);
    }

    #[test]
    fn test_default_stream_emits_every_line() {
        let evaluator = ScriptedEvaluator::new();
        let input: SourceReader = Box::new(io::Cursor::new(b"{\"v\":1}\n{\"v\":2}\n".to_vec()));
        let mut seen = Vec::new();
        evaluator
            .evaluate_stream(&Invocation::compact(".v"), input, &mut |line| {
                seen.push(line.to_string());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec!["1", "2"]);
    }

    #[test]
    fn test_default_stream_stops_on_refused_line() {
        let evaluator = ScriptedEvaluator::new();
        let input: SourceReader = Box::new(io::Cursor::new(b"{}\n{}\n".to_vec()));
        let err = evaluator
            .evaluate_stream(&Invocation::compact("."), input, &mut |_| {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            })
            .unwrap_err();
        assert!(matches!(err, EvalError::Output { kind: io::ErrorKind::BrokenPipe, .. }));
    }
}
