//! Branch Predictor Interface.
//!
//! This module defines the `BranchPredictor` trait that all direction predictors
//! implement. The core calls [`BranchPredictor::predict`] once per resolved
//! branch: it looks up the guess, trains on the real outcome, and reports
//! whether the guess was right.

/// Trait for branch direction prediction algorithms.
pub trait BranchPredictor {
    /// Predicts whether the branch at `pc` is taken.
    ///
    /// # Arguments
    ///
    /// * `pc` - Program counter of the branch instruction
    fn predict_branch(&self, pc: u64) -> bool;

    /// Trains the predictor with the resolved direction.
    ///
    /// # Arguments
    ///
    /// * `pc` - Program counter of the branch instruction
    /// * `taken` - Whether the branch was actually taken
    fn update_branch(&mut self, pc: u64, taken: bool);

    /// Predicts, trains, and reports whether the prediction matched `taken`.
    ///
    /// # Returns
    ///
    /// `true` if the branch was predicted correctly.
    fn predict(&mut self, pc: u64, taken: bool) -> bool {
        let guess = self.predict_branch(pc);
        self.update_branch(pc, taken);
        guess == taken
    }
}
