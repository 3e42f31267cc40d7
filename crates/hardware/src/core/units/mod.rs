//! Execution units and functional components.
//!
//! Only the branch resolution unit has state the timing model needs; execution
//! latencies of the other units are carried by the decoded micro-ops.

/// Branch Resolution Unit: direction predictors.
pub mod bru;
