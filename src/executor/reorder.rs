//! Reorder buffer
//!
//! Holds completed partitions until every lower sequence index has been
//! released. A min-heap keyed by sequence index, so release is O(log n) per
//! partition regardless of how far out of order results arrive.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Pending<T> {
    seq: u64,
    item: T,
}

impl<T> PartialEq for Pending<T> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<T> Eq for Pending<T> {}

impl<T> PartialOrd for Pending<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Pending<T> {
    // Reversed: BinaryHeap is a max-heap, we want the lowest seq on top
    fn cmp(&self, other: &Self) -> Ordering {
        other.seq.cmp(&self.seq)
    }
}

/// Releases items strictly in sequence order, starting at 0
pub struct ReorderBuffer<T> {
    heap: BinaryHeap<Pending<T>>,
    next_seq: u64,
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Buffers a completed item
    pub fn push(&mut self, seq: u64, item: T) {
        self.heap.push(Pending { seq, item });
    }

    /// Releases the next item if it has arrived
    pub fn pop_ready(&mut self) -> Option<(u64, T)> {
        if self.heap.peek()?.seq != self.next_seq {
            return None;
        }
        let Pending { seq, item } = self.heap.pop()?;
        self.next_seq += 1;
        Some((seq, item))
    }

    /// Sequence index expected next
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Items waiting on a lower sequence index
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
