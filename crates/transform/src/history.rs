//! Bounded history of transformed batch sets

use std::collections::VecDeque;

use etl_protocol::TransformedBatch;
use parking_lot::Mutex;

/// FIFO ring of the last N batch sets produced by a pipeline
///
/// A "set" is everything one tick produced (one batch per endpoint).
/// Readers get a snapshot copy; the internal storage is never aliased.
#[derive(Debug)]
pub struct HistoryRing {
    capacity: usize,
    entries: Mutex<VecDeque<Vec<TransformedBatch>>>,
}

impl HistoryRing {
    /// Create a ring holding at most `capacity` batch sets
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a batch set, evicting the oldest when full
    ///
    /// A zero-capacity ring stays empty.
    pub fn push(&self, batches: Vec<TransformedBatch>) {
        if self.capacity == 0 {
            return;
        }

        let mut entries = self.entries.lock();
        entries.push_back(batches);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Number of retained batch sets
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the ring is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy of the retained batch sets, oldest first
    pub fn snapshot(&self) -> Vec<Vec<TransformedBatch>> {
        self.entries.lock().iter().cloned().collect()
    }
}
