//! Out-of-order core timing model.
//!
//! This module contains everything a simulated core owns: the block-at-a-time
//! timing loop, the fetch front end, the backend resource trackers, the branch
//! predictors, and the bookkeeping for leaving and rejoining multi-core phases.

/// Fetch front end (branch resolution, wrong-path and block fetch).
pub mod frontend;

/// Out-of-order core and its builder.
pub mod ooo;

/// Backend timing structures (trackers, issue window, scoreboard, forwarding).
pub mod pipeline;

/// Halted-gap and contention bookkeeping.
pub mod recorder;

/// Execution units (branch predictors).
pub mod units;

/// Micro-op and basic-block descriptors.
pub mod uop;

pub use self::ooo::{OooCore, OooCoreBuilder, UopTiming};
pub use self::uop::{BasicBlock, BranchRecord, Uop, UopKind};
