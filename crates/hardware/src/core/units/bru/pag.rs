//! PAg Two-Level Branch Predictor.
//!
//! A table of per-branch history registers, selected by a folded hash of the PC,
//! indexes a single pattern table of 2-bit counters shared by all branches. History
//! bits beyond the pattern table index width are folded back in with XOR.

use super::BranchPredictor;

/// log2 of the number of history registers.
const HIST_TABLE_BITS: u32 = 11;
/// History register length in bits.
const HIST_BITS: u32 = 18;
/// log2 of the number of pattern table counters.
const PHT_BITS: u32 = 14;

const HIST_MASK: u32 = (1 << HIST_BITS) - 1;
const PHT_MASK: u32 = (1 << PHT_BITS) - 1;

/// PAg predictor state.
#[derive(Clone, Debug)]
pub struct PagPredictor {
    /// Per-branch history registers.
    bhsr: Vec<u32>,
    /// Shared 2-bit counters, weakly not-taken at reset.
    pht: Vec<u8>,
}

impl Default for PagPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl PagPredictor {
    /// Creates a predictor with cleared history and weakly not-taken counters.
    pub fn new() -> Self {
        Self {
            bhsr: vec![0; 1 << HIST_TABLE_BITS],
            pht: vec![1; 1 << PHT_BITS],
        }
    }

    const fn history_index(pc: u64) -> usize {
        let folded = pc ^ (pc >> HIST_TABLE_BITS) ^ (pc >> (2 * HIST_TABLE_BITS));
        (folded as usize) & ((1 << HIST_TABLE_BITS) - 1)
    }

    const fn pattern_index(history: u32) -> usize {
        let idx = history ^ ((history & !PHT_MASK) >> (HIST_BITS - PHT_BITS));
        (idx & PHT_MASK) as usize
    }
}

impl BranchPredictor for PagPredictor {
    fn predict_branch(&self, pc: u64) -> bool {
        let history = self.bhsr[Self::history_index(pc)];
        self.pht[Self::pattern_index(history)] > 1
    }

    fn update_branch(&mut self, pc: u64, taken: bool) {
        let h_idx = Self::history_index(pc);
        let p_idx = Self::pattern_index(self.bhsr[h_idx]);
        let counter = self.pht[p_idx];
        let guess = counter > 1;

        self.pht[p_idx] = match (taken, guess) {
            (true, true) => 3,
            (true, false) => counter + 1,
            (false, true) => counter - 1,
            (false, false) => 0,
        };
        self.bhsr[h_idx] = ((self.bhsr[h_idx] << 1) & HIST_MASK) | u32::from(taken);
    }
}
