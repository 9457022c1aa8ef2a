//! Output sinks
//!
//! A sink receives whole output lines from exactly one collector, so lines
//! from different partitions never interleave.

use std::io::{self, Write};

/// Destination for output lines
pub trait LineSink {
    /// Writes one line
    fn emit(&mut self, line: &str) -> io::Result<()>;

    /// Flushes buffered output
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink over any writer
pub struct WriterSink<W: Write> {
    writer: W,
    terminator: &'static str,
}

impl<W: Write> WriterSink<W> {
    /// Newline-terminated lines
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            terminator: "\n",
        }
    }

    /// Pieces written back to back, for `-j`.
    ///
    /// Each piece carries whatever newlines the evaluator printed.
    pub fn joined(writer: W) -> Self {
        Self {
            writer,
            terminator: "",
        }
    }

    /// Returns the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> LineSink for WriterSink<W> {
    fn emit(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(self.terminator.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Collecting sink, used by tests and by callers that post-process output
impl LineSink for Vec<String> {
    fn emit(&mut self, line: &str) -> io::Result<()> {
        self.push(line.to_string());
        Ok(())
    }
}
