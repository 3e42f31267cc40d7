//! Static Branch Predictor.
//!
//! Implements an "Always Not Taken" policy: every taken branch is a misprediction.

use super::BranchPredictor;

/// Static Branch Predictor structure.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticPredictor;

impl StaticPredictor {
    /// Creates a new Static Predictor.
    pub const fn new() -> Self {
        Self
    }
}

impl BranchPredictor for StaticPredictor {
    /// Always predicts not taken.
    fn predict_branch(&self, _pc: u64) -> bool {
        false
    }

    /// Keeps no history.
    fn update_branch(&mut self, _pc: u64, _taken: bool) {}
}
