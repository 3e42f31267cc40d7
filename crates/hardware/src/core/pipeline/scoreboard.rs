//! Register ready-cycle scoreboard.
//!
//! Maps every register index to the cycle its latest producer completes. Index 0
//! is the "no register" sentinel and always reads as ready at the current cycle.

use crate::common::constants::{MAX_REGISTERS, ZERO_REG};

/// Cycle at which each register's value becomes available.
#[derive(Clone, Debug)]
pub struct RegScoreboard {
    ready: Vec<u64>,
}

impl Default for RegScoreboard {
    fn default() -> Self {
        Self::new()
    }
}

impl RegScoreboard {
    /// Creates a scoreboard with every register ready at cycle 0.
    pub fn new() -> Self {
        Self {
            ready: vec![0; MAX_REGISTERS],
        }
    }

    /// Ready cycles of both sources, treating the sentinel as ready at `cur_cycle`.
    pub fn sources_ready(&mut self, rs: [u8; 2], cur_cycle: u64) -> (u64, u64) {
        self.ready[ZERO_REG as usize] = cur_cycle;
        (self.ready[rs[0] as usize], self.ready[rs[1] as usize])
    }

    /// Ready cycle of a single register.
    #[inline]
    pub fn ready_cycle(&self, reg: u8) -> u64 {
        self.ready[reg as usize]
    }

    /// Records that `reg` is produced at `cycle`.
    ///
    /// Writing the sentinel is harmless; it is overwritten before every read.
    #[inline]
    pub fn stamp(&mut self, reg: u8, cycle: u64) {
        self.ready[reg as usize] = cycle;
    }
}
