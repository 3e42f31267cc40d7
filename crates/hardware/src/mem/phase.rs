//! Global phase clock.
//!
//! Cores run independently for a bounded number of cycles (a phase) and then meet at
//! a barrier. The driver advances this clock once per barrier; memory channels read
//! it to decide when to recompute their latency.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared phase counter.
#[derive(Debug)]
pub struct PhaseClock {
    phase_length: u64,
    num_phases: AtomicU64,
}

impl PhaseClock {
    /// Creates a clock at phase 0.
    ///
    /// # Panics
    ///
    /// Panics if `phase_length` is zero.
    pub fn new(phase_length: u64) -> Self {
        assert!(phase_length > 0, "phase length must be nonzero");
        Self {
            phase_length,
            num_phases: AtomicU64::new(0),
        }
    }

    /// Cycles per phase.
    #[inline]
    pub const fn phase_length(&self) -> u64 {
        self.phase_length
    }

    /// Phases completed so far.
    #[inline]
    pub fn num_phases(&self) -> u64 {
        self.num_phases.load(Ordering::Acquire)
    }

    /// First cycle of the current phase.
    #[inline]
    pub fn global_phase_cycles(&self) -> u64 {
        self.num_phases() * self.phase_length
    }

    /// Ends the current phase and returns the new phase count.
    pub fn advance_phase(&self) -> u64 {
        self.num_phases.fetch_add(1, Ordering::AcqRel) + 1
    }
}
