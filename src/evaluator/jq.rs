//! `jq` process evaluator
//!
//! Each call spawns the `jq` binary with an argument vector (never a shell
//! string), feeds the chunk on stdin and collects stdout lines. A nonzero exit
//! status is an [`EvalError::Failed`]; callers decide what that means for the
//! run.
//!
//! Output is split on `\n` only. Under `-j` each piece keeps its newline, so
//! concatenating the pieces reproduces jq's bytes exactly.

use std::borrow::Cow;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;

use memchr::memchr_iter;

use crate::source::SourceReader;

use super::errors::{EvalError, EvalResult};
use super::{Evaluator, Invocation, OutputStyle};

/// Evaluator flags passed through from the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluatorOptions {
    /// `-c`
    pub compact: bool,
    /// `-r`
    pub raw_output: bool,
    /// `-j`
    pub join_output: bool,
    /// `-a`
    pub ascii_output: bool,
    /// `-S`
    pub sort_keys: bool,
    /// `--tab`
    pub tab: bool,
    /// `-s`
    pub slurp: bool,
    /// `-n`
    pub null_input: bool,
    /// `--arg NAME VALUE`
    pub args: Vec<(String, String)>,
    /// `--argjson NAME JSON`
    pub json_args: Vec<(String, String)>,
}

impl EvaluatorOptions {
    /// Slurp and null-input turn the whole input into one value, so records
    /// can no longer be evaluated independently.
    pub fn consumes_whole_input(&self) -> bool {
        self.slurp || self.null_input
    }

    /// Builds the argument vector placed before the filter.
    pub fn to_args(&self, style: OutputStyle) -> Vec<String> {
        let mut args = Vec::new();

        match style {
            OutputStyle::Compact => args.push("-c".to_string()),
            OutputStyle::Passthrough => {
                let flags = [
                    (self.compact, "-c"),
                    (self.raw_output, "-r"),
                    (self.join_output, "-j"),
                    (self.ascii_output, "-a"),
                    (self.sort_keys, "-S"),
                    (self.tab, "--tab"),
                ];
                args.extend(
                    flags
                        .iter()
                        .filter(|(on, _)| *on)
                        .map(|(_, flag)| flag.to_string()),
                );
            }
        }

        // Input-shaping flags apply regardless of output style
        if self.slurp {
            args.push("-s".to_string());
        }
        if self.null_input {
            args.push("-n".to_string());
        }

        for (name, value) in &self.args {
            args.extend(["--arg".to_string(), name.clone(), value.clone()]);
        }
        for (name, value) in &self.json_args {
            args.extend(["--argjson".to_string(), name.clone(), value.clone()]);
        }

        args
    }
}

/// Evaluator backed by an external `jq` executable
#[derive(Debug, Clone)]
pub struct JqEvaluator {
    program: PathBuf,
    options: EvaluatorOptions,
}

impl JqEvaluator {
    /// Creates an evaluator for the given binary and pass-through options
    pub fn new(program: impl Into<PathBuf>, options: EvaluatorOptions) -> Self {
        Self {
            program: program.into(),
            options,
        }
    }

    /// Path of the evaluator binary
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs `jq --version` to check the binary is installed and runnable.
    ///
    /// Returns the reported version string.
    pub fn probe(&self) -> EvalResult<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.unavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(self.unavailable(format!(
                "--version exited with {}",
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn unavailable(&self, reason: String) -> EvalError {
        EvalError::Unavailable {
            program: self.program.display().to_string(),
            reason,
        }
    }
}

impl JqEvaluator {
    fn spawn(&self, invocation: &Invocation) -> EvalResult<Child> {
        Command::new(&self.program)
            .args(self.options.to_args(invocation.style()))
            .arg(invocation.filter())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.unavailable(e.to_string()))
    }

    /// `-j` output has no value separators, so newlines are part of the data
    fn keeps_newlines(&self, invocation: &Invocation) -> bool {
        invocation.style() == OutputStyle::Passthrough && self.options.join_output
    }
}

impl Evaluator for JqEvaluator {
    fn evaluate(&self, invocation: &Invocation, input: &[u8]) -> EvalResult<Vec<String>> {
        let mut child = self.spawn(invocation)?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EvalError::Io("stdin not captured".into()))?;

        // Feed stdin from a scoped thread so a full stdout pipe cannot deadlock us
        let (output, fed) = thread::scope(|scope| {
            let feeder = scope.spawn(move || stdin.write_all(input));
            let output = child.wait_with_output();
            let fed = feeder
                .join()
                .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "feeder panicked")));
            (output, fed)
        });

        let output = output.map_err(|e| EvalError::Io(e.to_string()))?;

        if !output.status.success() {
            return Err(failed(output.status, &String::from_utf8_lossy(&output.stderr)));
        }

        // jq may stop reading early (e.g. `first(inputs)`); a closed pipe is fine then
        if let Err(e) = fed {
            if e.kind() != io::ErrorKind::BrokenPipe {
                return Err(EvalError::Io(e.to_string()));
            }
        }

        Ok(split_output(&output.stdout, self.keeps_newlines(invocation)))
    }

    fn evaluate_stream(
        &self,
        invocation: &Invocation,
        mut input: SourceReader,
        emit: &mut dyn FnMut(&str) -> io::Result<()>,
    ) -> EvalResult<()> {
        let mut child = self.spawn(invocation)?;
        let not_captured = |pipe: &str| EvalError::Io(format!("{} not captured", pipe));
        let mut stdin = child.stdin.take().ok_or_else(|| not_captured("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| not_captured("stdout"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| not_captured("stderr"))?;

        // The source may be a pipe that never ends, so the feeder is not joined.
        // It reports before closing stdin, so the result is in the channel by
        // the time jq has seen end of input.
        let (fed_tx, fed_rx) = mpsc::channel();
        thread::spawn(move || {
            let copied = io::copy(&mut input, &mut stdin);
            let _ = fed_tx.send(copied);
            drop(stdin);
        });
        let diagnostics = thread::spawn(move || {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text);
            text
        });

        let keep_newlines = self.keeps_newlines(invocation);
        let mut reader = BufReader::new(stdout);
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line);
            let written = match read {
                Ok(0) => break,
                Ok(_) => emit(&*output_piece(&line, keep_newlines)).map_err(EvalError::output),
                Err(e) => Err(EvalError::Io(e.to_string())),
            };
            if let Err(err) = written {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
        }

        let status = child.wait().map_err(|e| EvalError::Io(e.to_string()))?;
        let stderr_text = diagnostics.join().unwrap_or_default();
        if !status.success() {
            return Err(failed(status, &stderr_text));
        }

        // An empty channel means jq exited without draining its input
        if let Ok(Err(e)) = fed_rx.try_recv() {
            if e.kind() != io::ErrorKind::BrokenPipe {
                return Err(EvalError::Io(e.to_string()));
            }
        }

        Ok(())
    }
}

fn failed(status: ExitStatus, stderr: &str) -> EvalError {
    EvalError::Failed {
        status: status.code(),
        stderr: stderr.trim().to_string(),
    }
}

/// One output line, with its `\n` kept or dropped. `\r` is always data.
fn output_piece(line: &[u8], keep_newline: bool) -> Cow<'_, str> {
    let line = if keep_newline {
        line
    } else {
        line.strip_suffix(b"\n").unwrap_or(line)
    };
    String::from_utf8_lossy(line)
}

/// Splits captured stdout on `\n` only
fn split_output(stdout: &[u8], keep_newlines: bool) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for end in memchr_iter(b'\n', stdout) {
        pieces.push(output_piece(&stdout[start..=end], keep_newlines).into_owned());
        start = end + 1;
    }
    if start < stdout.len() {
        pieces.push(output_piece(&stdout[start..], keep_newlines).into_owned());
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_style_ignores_output_flags() {
        let options = EvaluatorOptions {
            raw_output: true,
            tab: true,
            ..Default::default()
        };
        assert_eq!(options.to_args(OutputStyle::Compact), vec!["-c"]);
    }

    #[test]
    fn test_passthrough_style_keeps_output_flags() {
        let options = EvaluatorOptions {
            raw_output: true,
            sort_keys: true,
            ..Default::default()
        };
        assert_eq!(options.to_args(OutputStyle::Passthrough), vec!["-r", "-S"]);
    }

    #[test]
    fn test_variable_bindings_survive_both_styles() {
        let options = EvaluatorOptions {
            args: vec![("name".into(), "alice".into())],
            json_args: vec![("min".into(), "3".into())],
            ..Default::default()
        };
        let expected = vec!["--arg", "name", "alice", "--argjson", "min", "3"];
        assert_eq!(options.to_args(OutputStyle::Passthrough), expected);

        let compact = options.to_args(OutputStyle::Compact);
        assert_eq!(compact[0], "-c");
        assert_eq!(&compact[1..], &expected[..]);
    }

    #[test]
    fn test_whole_input_options() {
        assert!(!EvaluatorOptions::default().consumes_whole_input());
        let slurp = EvaluatorOptions {
            slurp: true,
            ..Default::default()
        };
        assert!(slurp.consumes_whole_input());
        let null_input = EvaluatorOptions {
            null_input: true,
            ..Default::default()
        };
        assert!(null_input.consumes_whole_input());
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let evaluator = JqEvaluator::new(
            "/nonexistent/jqpar-test-binary",
            EvaluatorOptions::default(),
        );
        let err = evaluator.probe().unwrap_err();
        assert!(err.is_startup());

        let err = evaluator
            .evaluate(&Invocation::passthrough("."), b"{}\n")
            .unwrap_err();
        assert!(err.is_startup());
    }

    #[test]
    fn test_split_output_keeps_carriage_returns() {
        assert_eq!(split_output(b"a\r\nb\n", false), vec!["a\r", "b"]);
        assert!(split_output(b"", false).is_empty());
    }

    #[test]
    fn test_joined_output_round_trips_embedded_newlines() {
        // `jq -j .m` over {"m":"a\nb"} then {"m":"c"}
        let stdout = b"a\nbc";
        let pieces = split_output(stdout, true);
        assert_eq!(pieces, vec!["a\n", "bc"]);
        assert_eq!(pieces.concat().as_bytes(), stdout);
    }

    #[test]
    fn test_only_passthrough_join_keeps_newlines() {
        let evaluator = JqEvaluator::new(
            "jq",
            EvaluatorOptions {
                join_output: true,
                raw_output: true,
                ..Default::default()
            },
        );
        assert!(evaluator.keeps_newlines(&Invocation::passthrough(".m")));
        assert!(!evaluator.keeps_newlines(&Invocation::compact(".m")));
    }
}
