//! Fetch front end.
//!
//! Runs once per basic block, after the previous block's micro-ops have been timed.
//! It performs:
//! 1. **Branch Resolution:** The block-ending branch is checked against the direction
//!    predictor. A wrong guess fetches a short burst of lines down the wrong path and
//!    holds fetch back until the branch itself commits.
//! 2. **Block Fetch:** The next block's bytes are read from the instruction cache one
//!    line at a time.
//! 3. **Decode Hand-off:** The decode cycle moves past fetch completion plus the fixed
//!    fetch-to-decode distance, with a one-cycle bubble per block.

use std::sync::Arc;

use tracing::trace;

use super::recorder::ContentionRecorder;
use super::units::bru::{BranchPredictor, BranchPredictorWrapper};
use super::uop::{BasicBlock, BranchRecord};
use crate::common::constants::FETCH_TO_DECODE;
use crate::config::CoreConfig;
use crate::mem::MemoryPort;
use crate::trace::CoreTracer;

/// Timing inputs of one front-end step.
#[derive(Clone, Copy, Debug)]
pub struct FetchTiming {
    /// Current issue cycle; instruction cache requests are timed from here.
    pub cur_cycle: u64,
    /// Decode cycle reached by the block just simulated.
    pub decode_cycle: u64,
    /// Commit cycle of the block's last micro-op.
    pub last_commit_cycle: u64,
    /// Instructions simulated so far.
    pub instrs: u64,
}

/// Branch predictor, instruction cache port, and the pending branch outcome.
pub struct FrontEnd {
    predictor: BranchPredictorWrapper,
    l1i: Arc<dyn MemoryPort>,
    line_bytes: u64,
    wrong_path_lines: u64,
    fetch_bytes_per_cycle: u64,
    branch: Option<BranchRecord>,
    branches: u64,
    mispred_branches: u64,
    wrong_path_fetches: u64,
    fetch_stalls: u64,
}

impl std::fmt::Debug for FrontEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrontEnd")
            .field("predictor", &self.predictor)
            .field("line_bytes", &self.line_bytes)
            .field("branch", &self.branch)
            .field("mispred_branches", &self.mispred_branches)
            .finish_non_exhaustive()
    }
}

impl FrontEnd {
    /// Creates a front end fetching through `l1i`.
    pub fn new(config: &CoreConfig, l1i: Arc<dyn MemoryPort>) -> Self {
        let line_bytes = 1u64 << l1i.line_bits();
        Self {
            predictor: BranchPredictorWrapper::new(config),
            line_bytes,
            wrong_path_lines: config.wrong_path_bytes / line_bytes,
            fetch_bytes_per_cycle: config.fetch_bytes_per_cycle.max(1),
            l1i,
            branch: None,
            branches: 0,
            mispred_branches: 0,
            wrong_path_fetches: 0,
            fetch_stalls: 0,
        }
    }

    /// Records the outcome of the branch ending the current block.
    pub const fn record_branch(&mut self, branch: BranchRecord) {
        self.branch = Some(branch);
    }

    /// Drops any recorded branch outcome.
    pub const fn clear_branch(&mut self) {
        self.branch = None;
    }

    /// Instruction cache port.
    pub fn l1i(&self) -> &Arc<dyn MemoryPort> {
        &self.l1i
    }

    /// Branches resolved.
    pub const fn branches(&self) -> u64 {
        self.branches
    }

    /// Branches predicted wrong.
    pub const fn mispred_branches(&self) -> u64 {
        self.mispred_branches
    }

    /// Lines fetched down wrong paths.
    pub const fn wrong_path_fetches(&self) -> u64 {
        self.wrong_path_fetches
    }

    /// Cycles decode waited on fetch.
    pub const fn fetch_stalls(&self) -> u64 {
        self.fetch_stalls
    }

    /// Resolves the pending branch and fetches `next`.
    ///
    /// # Arguments
    ///
    /// * `next` - Block about to be decoded.
    /// * `timing` - Cycles reached by the block just simulated.
    /// * `tracer` - Receives one line per fetched line when fetch tracing is on.
    /// * `recorder` - Accumulates the latency of every line fetched.
    ///
    /// # Returns
    ///
    /// The decode cycle of the first micro-op of `next`.
    pub fn fetch(
        &mut self,
        next: &BasicBlock,
        timing: FetchTiming,
        tracer: &mut CoreTracer,
        recorder: &mut ContentionRecorder,
    ) -> u64 {
        let cur_cycle = timing.cur_cycle;
        let mut fetch_cycle = timing.decode_cycle.saturating_sub(FETCH_TO_DECODE);

        if let Some(branch) = self.branch.take() {
            self.branches += 1;
            if !self.predictor.predict(branch.pc, branch.taken) {
                self.mispred_branches += 1;
                self.fetch_wrong_path(&branch, fetch_cycle, timing, tracer, recorder);
                // Fetch restarts once the branch commits.
                fetch_cycle = timing.last_commit_cycle;
            }
        }

        let end_addr = next.addr + next.bytes;
        for line_addr in (next.addr..end_addr).step_by(self.line_bytes as usize) {
            let resp = self.l1i.load(line_addr, cur_cycle, timing.instrs);
            recorder.record(cur_cycle, resp);
            fetch_cycle += resp.saturating_sub(cur_cycle);
            tracer.fetch(line_addr, self.line_bytes as u32);
        }

        let mut decode_cycle = timing.decode_cycle + 1;
        let min_decode_cycle = fetch_cycle + FETCH_TO_DECODE;
        if min_decode_cycle > decode_cycle {
            self.fetch_stalls += min_decode_cycle - decode_cycle;
            decode_cycle = min_decode_cycle;
        }
        decode_cycle
    }

    /// Fetches lines after the wrong-path target until one would return after the
    /// branch commits, throttled by the fetch bandwidth.
    ///
    /// Only lines that return in time are traced.
    fn fetch_wrong_path(
        &mut self,
        branch: &BranchRecord,
        fetch_cycle: u64,
        timing: FetchTiming,
        tracer: &mut CoreTracer,
        recorder: &mut ContentionRecorder,
    ) {
        let wrong_path_addr = branch.wrong_path_addr();
        let issue_gap = self.line_bytes / self.fetch_bytes_per_cycle;
        let mut req_cycle = fetch_cycle;
        for i in 0..self.wrong_path_lines {
            let addr = wrong_path_addr + self.line_bytes * i;
            let resp = self.l1i.load(addr, timing.cur_cycle, timing.instrs);
            recorder.record(timing.cur_cycle, resp);
            self.wrong_path_fetches += 1;
            let resp_cycle = req_cycle + resp.saturating_sub(timing.cur_cycle);
            if resp_cycle > timing.last_commit_cycle {
                break;
            }
            req_cycle = resp_cycle + issue_gap;
            tracer.fetch(addr, self.line_bytes as u32);
        }
        trace!(
            pc = branch.pc,
            wrong_path_addr,
            last_commit = timing.last_commit_cycle,
            "front end: branch mispredicted"
        );
    }
}
