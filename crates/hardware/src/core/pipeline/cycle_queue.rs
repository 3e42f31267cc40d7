//! Decoded micro-op queue.
//!
//! A plain FIFO with no retire width: each entry frees the cycle its micro-op
//! leaves for issue.

use super::traits::ResourceTracker;

/// Circular buffer of leave cycles.
#[derive(Clone, Debug)]
pub struct CycleQueue {
    buf: Vec<u64>,
    idx: usize,
}

impl CycleQueue {
    /// Creates a queue with `capacity` entries, all free at cycle 0.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cycle queue needs at least one entry");
        Self {
            buf: vec![0; capacity],
            idx: 0,
        }
    }

    /// Records that the oldest queued micro-op left at `cycle`.
    #[inline]
    pub fn mark_leave(&mut self, cycle: u64) {
        self.buf[self.idx] = cycle;
        self.idx += 1;
        if self.idx == self.buf.len() {
            self.idx = 0;
        }
    }
}

impl ResourceTracker for CycleQueue {
    #[inline]
    fn min_alloc_cycle(&self) -> u64 {
        self.buf[self.idx]
    }

    #[inline]
    fn mark_retire(&mut self, cycle: u64) {
        self.mark_leave(cycle);
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn occupancy_at(&self, cycle: u64) -> usize {
        self.buf.iter().filter(|&&c| c > cycle).count()
    }
}
