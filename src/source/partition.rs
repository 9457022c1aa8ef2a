//! Line-aligned partitioning
//!
//! A partition is a contiguous run of whole lines, roughly `block_size` bytes
//! long. The partitioner reads `block_size` bytes and then extends to the end
//! of the current line, so no record is ever split and every byte of the
//! source lands in exactly one partition. Sequence indexes start at 0.

use std::io::{self, BufRead};

/// A contiguous, line-aligned chunk of the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    seq: u64,
    data: Vec<u8>,
}

impl Partition {
    /// Creates a partition
    pub fn new(seq: u64, data: Vec<u8>) -> Self {
        Self { seq, data }
    }

    /// Sequence index (submission order)
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Raw bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the partition holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of lines, counting a final unterminated line
    pub fn line_count(&self) -> u64 {
        count_lines_in(&self.data)
    }
}

/// Counts lines in a buffer, including a final line without `\n`.
pub fn count_lines_in(buf: &[u8]) -> u64 {
    let newlines = memchr::memchr_iter(b'\n', buf).count() as u64;
    match buf.last() {
        Some(b'\n') | None => newlines,
        Some(_) => newlines + 1,
    }
}

/// Iterator of line-aligned partitions over a buffered reader
pub struct Partitioner<R: BufRead> {
    reader: R,
    block_size: usize,
    next_seq: u64,
    done: bool,
}

impl<R: BufRead> Partitioner<R> {
    /// Creates a partitioner. A zero block size is treated as one byte, which
    /// yields one partition per line.
    pub fn new(reader: R, block_size: usize) -> Self {
        Self {
            reader,
            block_size: block_size.max(1),
            next_seq: 0,
            done: false,
        }
    }

    fn fill_block(&mut self, buf: &mut Vec<u8>) -> io::Result<()> {
        while buf.len() < self.block_size {
            let available = match self.reader.fill_buf() {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                self.done = true;
                return Ok(());
            }

            let wanted = self.block_size - buf.len();
            let take = available.len().min(wanted);
            buf.extend_from_slice(&available[..take]);
            self.reader.consume(take);
        }

        // Finish the line we stopped inside
        if buf.last() != Some(&b'\n') {
            let read = self.reader.read_until(b'\n', buf)?;
            if read == 0 {
                self.done = true;
            }
        }
        Ok(())
    }
}

impl<R: BufRead> Iterator for Partitioner<R> {
    type Item = io::Result<Partition>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut buf = Vec::with_capacity(self.block_size.saturating_add(256).min(1 << 24));
        if let Err(e) = self.fill_block(&mut buf) {
            self.done = true;
            return Some(Err(e));
        }
        if buf.is_empty() {
            self.done = true;
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        Some(Ok(Partition::new(seq, buf)))
    }
}
