//! GShare Branch Predictor.
//!
//! GShare correlates global branch history with the program counter using an XOR
//! hash. This allows the predictor to distinguish the same branch instruction
//! in different execution contexts.
//!
//! # Performance
//!
//! - **Time Complexity:**
//!   - `predict()`: O(1)
//!   - `update()`: O(1)
//! - **Space Complexity:** O(2^N) where N is the history length (12 bits = 4KB for 2-bit counters)
//! - **Best Case:** Correlated branches where outcome depends on recent history
//! - **Worst Case:** Uncorrelated branches or history length too short/long for pattern

use super::BranchPredictor;

/// Size of the Pattern History Table (2^12 entries).
const TABLE_BITS: usize = 12;
/// Total number of entries in the PHT.
const TABLE_SIZE: usize = 1 << TABLE_BITS;
const TABLE_MASK: u64 = (TABLE_SIZE as u64) - 1;

/// GShare Predictor structure.
#[derive(Clone, Debug)]
pub struct GSharePredictor {
    /// Global History Register storing recent branch outcomes.
    ghr: u64,
    /// Pattern History Table containing 2-bit saturating counters.
    pht: Vec<u8>,
}

impl Default for GSharePredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl GSharePredictor {
    /// Creates a new GShare Predictor with weakly not-taken counters.
    pub fn new() -> Self {
        Self {
            ghr: 0,
            pht: vec![1; TABLE_SIZE],
        }
    }

    /// Computes the XOR of the PC (shifted) and the Global History Register.
    const fn index(&self, pc: u64) -> usize {
        (((pc >> 2) & TABLE_MASK) ^ (self.ghr & TABLE_MASK)) as usize
    }
}

impl BranchPredictor for GSharePredictor {
    /// Returns true if the 2-bit counter at the hashed index is 2 or 3.
    fn predict_branch(&self, pc: u64) -> bool {
        self.pht[self.index(pc)] >= 2
    }

    /// Updates the saturating counter and shifts the outcome into the history.
    fn update_branch(&mut self, pc: u64, taken: bool) {
        let idx = self.index(pc);
        let counter = self.pht[idx];

        if taken && counter < 3 {
            self.pht[idx] += 1;
        } else if !taken && counter > 0 {
            self.pht[idx] -= 1;
        }

        self.ghr = ((self.ghr << 1) | u64::from(taken)) & TABLE_MASK;
    }
}
