//! Contention recorder.
//!
//! Tracks the parts of a core's timeline that are not spent executing its own
//! blocks. It provides:
//! 1. **Halted Gaps:** Cycles between leaving the simulation and rejoining it, during
//!    which the global clock moved on without this core.
//! 2. **Contention Delay:** Extra cycles injected by a contention model, applied the
//!    next time the core rejoins or closes a contention window.
//! 3. **Access Totals:** Count and total latency of the core's data accesses and
//!    instruction fetches.

use tracing::debug;

/// Whether the owning core is currently part of the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RecorderState {
    Running,
    Halted,
}

/// Per-core gap and contention bookkeeping.
#[derive(Clone, Debug)]
pub struct ContentionRecorder {
    state: RecorderState,
    gap_cycles: u64,
    pending_delay: u64,
    contention_cycles: u64,
    accesses: u64,
    access_cycles: u64,
}

impl Default for ContentionRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentionRecorder {
    /// Creates a recorder for a running core with no history.
    pub const fn new() -> Self {
        Self {
            state: RecorderState::Running,
            gap_cycles: 0,
            pending_delay: 0,
            contention_cycles: 0,
            accesses: 0,
            access_cycles: 0,
        }
    }

    /// Records an access issued at `start` and completed at `resp`.
    pub const fn record(&mut self, start: u64, resp: u64) {
        self.accesses += 1;
        self.access_cycles += resp.saturating_sub(start);
    }

    /// Queues `cycles` of contention delay for the next synchronization point.
    pub const fn add_contention(&mut self, cycles: u64) {
        self.pending_delay += cycles;
    }

    /// Notes that the core leaves the simulation at `cur_cycle`.
    pub fn notify_leave(&mut self, cur_cycle: u64) {
        debug!(cur_cycle, "recorder: leave");
        self.state = RecorderState::Halted;
    }

    /// Rejoins the simulation and returns the cycle the core must resume at.
    ///
    /// A halted core resumes no earlier than `global_cycle`; any queued contention
    /// delay is added on top.
    pub fn notify_join(&mut self, cur_cycle: u64, global_cycle: u64) -> u64 {
        let mut target = cur_cycle;
        if self.state == RecorderState::Halted {
            if global_cycle > cur_cycle {
                self.gap_cycles += global_cycle - cur_cycle;
                target = global_cycle;
            }
            self.state = RecorderState::Running;
        }
        target + self.drain_delay()
    }

    /// Opens a contention window at `cur_cycle`.
    pub const fn cs_start(&self, cur_cycle: u64) -> u64 {
        cur_cycle
    }

    /// Closes a contention window and returns the cycle the core must resume at.
    pub const fn cs_end(&mut self, cur_cycle: u64) -> u64 {
        cur_cycle + self.drain_delay()
    }

    const fn drain_delay(&mut self) -> u64 {
        let delay = self.pending_delay;
        self.pending_delay = 0;
        self.contention_cycles += delay;
        delay
    }

    /// Cycles spent executing, excluding halted gaps.
    pub const fn unhalted_cycles(&self, cur_cycle: u64) -> u64 {
        cur_cycle.saturating_sub(self.gap_cycles)
    }

    /// Total contention delay applied so far.
    pub const fn contention_cycles(&self) -> u64 {
        self.contention_cycles
    }

    /// Number of recorded accesses.
    pub const fn accesses(&self) -> u64 {
        self.accesses
    }

    /// Sum of recorded access latencies.
    pub const fn access_cycles(&self) -> u64 {
        self.access_cycles
    }
}
