//! Retire-width-limited circular tracker.
//!
//! Models the reorder buffer and the load and store queues. Every entry records
//! the cycle it retires; retirement is in program order and at most `width`
//! entries retire in any one cycle. It provides:
//! 1. **Allocation:** The next entry is free once the entry `capacity` positions back retired.
//! 2. **In-order Retirement:** Retire cycles never decrease across successive entries.
//! 3. **Width Limit:** A full retire cycle pushes later entries into the next cycle.

use super::traits::ResourceTracker;

/// Circular buffer of retire cycles.
#[derive(Clone, Debug)]
pub struct ReorderBuffer {
    /// Retire cycle of each slot, oldest at `idx`.
    buf: Vec<u64>,
    /// Slot the next allocation reuses.
    idx: usize,
    /// Retirements per cycle.
    width: u32,
    /// Cycle of the most recent retirement.
    cur_retire_cycle: u64,
    /// Retirements already booked in `cur_retire_cycle`.
    cur_cycle_retires: u32,
}

impl ReorderBuffer {
    /// Creates a tracker with `capacity` entries retiring at most `width` per cycle.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` or `width` is zero.
    pub fn new(capacity: usize, width: u32) -> Self {
        assert!(capacity > 0, "retire tracker needs at least one entry");
        assert!(width > 0, "retire tracker needs a nonzero retire width");
        Self {
            buf: vec![0; capacity],
            idx: 0,
            width,
            cur_retire_cycle: 0,
            cur_cycle_retires: 0,
        }
    }

    /// Cycle the most recent entry retires.
    #[inline]
    pub const fn last_retire_cycle(&self) -> u64 {
        self.cur_retire_cycle
    }

    /// Maximum retirements per cycle.
    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }
}

impl ResourceTracker for ReorderBuffer {
    #[inline]
    fn min_alloc_cycle(&self) -> u64 {
        self.buf[self.idx]
    }

    fn mark_retire(&mut self, cycle: u64) {
        if cycle <= self.cur_retire_cycle {
            if self.cur_cycle_retires == self.width {
                self.cur_retire_cycle += 1;
                self.cur_cycle_retires = 1;
            } else {
                self.cur_cycle_retires += 1;
            }
        } else {
            self.cur_retire_cycle = cycle;
            self.cur_cycle_retires = 1;
        }

        self.buf[self.idx] = self.cur_retire_cycle;
        self.idx += 1;
        if self.idx == self.buf.len() {
            self.idx = 0;
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn occupancy_at(&self, cycle: u64) -> usize {
        self.buf.iter().filter(|&&c| c > cycle).count()
    }
}
