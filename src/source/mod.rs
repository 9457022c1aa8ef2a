//! Record sources
//!
//! A [`RecordSource`] is either bounded (a file, or bytes already in memory)
//! or an unbounded stream such as stdin. Bounded sources report their exact
//! line count. Streams cannot be measured without consuming them, so they
//! report [`SizeEstimate::Unbounded`].

mod errors;
mod partition;

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

pub use errors::{SourceError, SourceResult};
pub use partition::{count_lines_in, Partition, Partitioner};

/// Boxed reader handed to executors
pub type SourceReader = Box<dyn BufRead + Send>;

/// Estimated size of a source, in records (lines)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeEstimate {
    /// Exact line count of a bounded source
    Lines(u64),
    /// Size unknown without consuming the stream
    Unbounded,
}

impl SizeEstimate {
    /// Returns true if the estimate is strictly above `threshold`.
    ///
    /// Unbounded streams always exceed the threshold.
    pub fn exceeds(&self, threshold: u64) -> bool {
        match self {
            SizeEstimate::Lines(n) => *n > threshold,
            SizeEstimate::Unbounded => true,
        }
    }
}

impl fmt::Display for SizeEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeEstimate::Lines(n) => write!(f, "{} lines", n),
            SizeEstimate::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Input to one run
pub enum RecordSource {
    /// A file on disk (bounded)
    File(PathBuf),
    /// Bytes already in memory (bounded)
    Memory { label: String, data: Vec<u8> },
    /// A stream of unknown length
    Stream { label: String, reader: SourceReader },
}

impl RecordSource {
    /// Opens a file source, failing fast if the path does not exist.
    pub fn open(path: impl AsRef<Path>) -> SourceResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SourceError::NotFound(path.to_path_buf()));
        }
        Ok(RecordSource::File(path.to_path_buf()))
    }

    /// Standard input, treated as unbounded
    pub fn stdin() -> Self {
        RecordSource::Stream {
            label: "<stdin>".to_string(),
            reader: Box::new(BufReader::new(io::stdin())),
        }
    }

    /// An arbitrary reader, treated as unbounded
    pub fn stream(label: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        RecordSource::Stream {
            label: label.into(),
            reader: Box::new(BufReader::new(reader)),
        }
    }

    /// In-memory bytes, treated as bounded
    pub fn memory(label: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        RecordSource::Memory {
            label: label.into(),
            data: data.into(),
        }
    }

    /// Human-readable name for logs and explain output
    pub fn label(&self) -> String {
        match self {
            RecordSource::File(path) => path.display().to_string(),
            RecordSource::Memory { label, .. } | RecordSource::Stream { label, .. } => {
                label.clone()
            }
        }
    }

    /// Estimates the number of records.
    ///
    /// Files are scanned once to count lines; streams are never touched.
    pub fn estimate_size(&self) -> SourceResult<SizeEstimate> {
        match self {
            RecordSource::File(path) => {
                let file = File::open(path).map_err(|e| open_error(path, e))?;
                let lines = count_lines(file).map_err(|e| SourceError::io(self.label(), e))?;
                Ok(SizeEstimate::Lines(lines))
            }
            RecordSource::Memory { data, .. } => Ok(SizeEstimate::Lines(count_lines_in(data))),
            RecordSource::Stream { .. } => Ok(SizeEstimate::Unbounded),
        }
    }

    /// Converts the source into a buffered reader
    pub fn into_reader(self) -> SourceResult<SourceReader> {
        match self {
            RecordSource::File(path) => {
                let file = File::open(&path).map_err(|e| open_error(&path, e))?;
                Ok(Box::new(BufReader::new(file)))
            }
            RecordSource::Memory { data, .. } => Ok(Box::new(Cursor::new(data))),
            RecordSource::Stream { reader, .. } => Ok(reader),
        }
    }

    /// Splits the source into line-aligned partitions of about `block_size` bytes
    pub fn partitions(self, block_size: usize) -> SourceResult<Partitioner<SourceReader>> {
        Ok(Partitioner::new(self.into_reader()?, block_size))
    }
}

fn open_error(path: &Path, err: io::Error) -> SourceError {
    match err.kind() {
        io::ErrorKind::NotFound => SourceError::NotFound(path.to_path_buf()),
        _ => SourceError::io(path.display().to_string(), err),
    }
}

impl fmt::Debug for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSource::File(path) => f.debug_tuple("File").field(path).finish(),
            RecordSource::Memory { label, data } => f
                .debug_struct("Memory")
                .field("label", label)
                .field("bytes", &data.len())
                .finish(),
            RecordSource::Stream { label, .. } => {
                f.debug_struct("Stream").field("label", label).finish()
            }
        }
    }
}

/// Counts lines in a reader, including a final line without `\n`.
pub fn count_lines<R: Read>(mut reader: R) -> io::Result<u64> {
    let mut buf = vec![0u8; 64 * 1024];
    let mut lines = 0u64;
    let mut last = None;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        lines += memchr::memchr_iter(b'\n', &buf[..n]).count() as u64;
        last = Some(buf[n - 1]);
    }

    match last {
        Some(b) if b != b'\n' => Ok(lines + 1),
        _ => Ok(lines),
    }
}
