//! Resource Tracker Interface.
//!
//! This module defines the common trait for fixed-depth backend structures. It provides:
//! 1. **Allocation Query:** The earliest cycle a new entry can be allocated.
//! 2. **Retirement:** Recording the cycle an entry frees up.

/// A fixed-depth structure that only tracks when its entries become free.
///
/// Entries are recycled in FIFO order, so the allocation cycle of the next entry is
/// the retirement cycle of the entry allocated `capacity` allocations ago.
pub trait ResourceTracker {
    /// Earliest cycle at which the next entry can be allocated.
    fn min_alloc_cycle(&self) -> u64;

    /// Records that the most recently allocated entry frees up no earlier than `cycle`.
    ///
    /// # Arguments
    ///
    /// * `cycle` - Earliest cycle the entry may leave.
    fn mark_retire(&mut self, cycle: u64);

    /// Number of entries.
    fn capacity(&self) -> usize;

    /// Number of entries still held at `cycle`.
    ///
    /// # Returns
    ///
    /// Count of recorded entries that free up strictly after `cycle`.
    fn occupancy_at(&self, cycle: u64) -> usize;
}
