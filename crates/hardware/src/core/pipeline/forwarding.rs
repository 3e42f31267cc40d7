//! Store-to-load forwarding table.
//!
//! A small direct-mapped table remembering when recent stores complete. A load
//! whose address matches the stored address of its slot cannot complete before
//! that store does.

use crate::common::constants::NO_ADDR;

#[derive(Clone, Copy, Debug)]
struct FwdEntry {
    addr: u64,
    store_cycle: u64,
}

impl FwdEntry {
    const EMPTY: Self = Self {
        addr: NO_ADDR,
        store_cycle: 0,
    };
}

/// Direct-mapped table of store completion cycles, indexed by word address.
#[derive(Clone, Debug)]
pub struct ForwardingTable {
    entries: Vec<FwdEntry>,
    mask: u64,
}

impl ForwardingTable {
    /// Creates an empty table.
    ///
    /// # Panics
    ///
    /// Panics unless `entries` is a nonzero power of two.
    pub fn new(entries: usize) -> Self {
        assert!(
            entries.is_power_of_two(),
            "forwarding table size {entries} is not a power of two"
        );
        Self {
            entries: vec![FwdEntry::EMPTY; entries],
            mask: entries as u64 - 1,
        }
    }

    #[inline]
    const fn index(&self, addr: u64) -> usize {
        ((addr >> 2) & self.mask) as usize
    }

    /// Records that the store to `addr` completes at `cycle`.
    pub fn record_store(&mut self, addr: u64, cycle: u64) {
        let idx = self.index(addr);
        self.entries[idx] = FwdEntry {
            addr,
            store_cycle: cycle,
        };
    }

    /// Completion cycle of a load to `addr` that would otherwise complete at `cycle`.
    pub fn forward(&self, addr: u64, cycle: u64) -> u64 {
        let e = &self.entries[self.index(addr)];
        if e.addr == addr {
            cycle.max(e.store_cycle)
        } else {
            cycle
        }
    }
}
