//! Branch prediction unit (BRU) implementations.
//!
//! The timing core only needs to know whether the direction of the block-ending
//! branch was guessed right, so predictors here model direction only: static
//! not-taken, gshare, and a per-address-history (PAg) two-level predictor.

pub use self::branch_predictor::BranchPredictor;

/// Branch predictor trait and common functionality.
pub mod branch_predictor;

/// Global history branch predictor (gshare algorithm).
pub mod gshare;

/// Two-level predictor with per-address history and a global pattern table.
pub mod pag;

/// Static branch predictor (always not-taken).
pub mod static_bp;

use self::{gshare::GSharePredictor, pag::PagPredictor, static_bp::StaticPredictor};
use crate::config::{BranchPredictor as BpType, CoreConfig};

/// Enum wrapper for static dispatch of Branch Predictors.
/// This avoids vtable lookups once per simulated block.
#[derive(Clone, Debug)]
pub enum BranchPredictorWrapper {
    /// Always not-taken.
    Static(StaticPredictor),
    /// Global history XOR PC.
    GShare(GSharePredictor),
    /// Per-address history, global pattern table.
    Pag(PagPredictor),
}

impl BranchPredictorWrapper {
    /// Creates the predictor selected in the core configuration.
    pub fn new(config: &CoreConfig) -> Self {
        match config.branch_predictor {
            BpType::Static => Self::Static(StaticPredictor::new()),
            BpType::GShare => Self::GShare(GSharePredictor::new()),
            BpType::Pag => Self::Pag(PagPredictor::new()),
        }
    }
}

impl BranchPredictor for BranchPredictorWrapper {
    #[inline(always)]
    fn predict_branch(&self, pc: u64) -> bool {
        match self {
            Self::Static(bp) => bp.predict_branch(pc),
            Self::GShare(bp) => bp.predict_branch(pc),
            Self::Pag(bp) => bp.predict_branch(pc),
        }
    }

    #[inline(always)]
    fn update_branch(&mut self, pc: u64, taken: bool) {
        match self {
            Self::Static(bp) => bp.update_branch(pc, taken),
            Self::GShare(bp) => bp.update_branch(pc, taken),
            Self::Pag(bp) => bp.update_branch(pc, taken),
        }
    }
}
