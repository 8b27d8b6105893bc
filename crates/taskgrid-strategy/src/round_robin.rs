//! Round-robin candidate selection.
//!
//! A single atomic counter hands out candidate indices for the BALANCED
//! strategy. The counter is process-wide and is not reset on strategy
//! switches; it only needs to be a stable source of variety.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free round-robin index dispenser.
pub struct RoundRobinCounter {
    counter: AtomicU64,
}

impl RoundRobinCounter {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Next index into a candidate list of the given length.
    ///
    /// Returns `None` when the list is empty.
    pub fn next(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        let tick = self.counter.fetch_add(1, Ordering::Relaxed);
        Some((tick % count as u64) as usize)
    }

    /// Total selections handed out so far (for diagnostics).
    pub fn total(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for RoundRobinCounter {
    fn default() -> Self {
        Self::new()
    }
}
