//! Out-of-order timing core.
//!
//! The core is driven one basic block at a time and always lags one block behind:
//! the block handed to [`OooCore::advance`] is only buffered, and the block buffered
//! by the previous call is simulated, using the load and store addresses recorded
//! in between. For each micro-op of that block it computes:
//! 1. **Decode:** Static decode offset within the block, bounded by the micro-op queue.
//! 2. **Issue:** Issue width and register file read ports per cycle.
//! 3. **Dispatch:** Operand readiness, reorder buffer space, and a free execution port.
//! 4. **Execute/Commit:** Per-kind completion, including the data cache, store-to-load
//!    forwarding, and ordering of loads behind unresolved store addresses.
//!
//! After the block, the front end resolves the block's branch and fetches the next block.
//!
//! Multi-core runs are bounded by phases: the driver checks [`OooCore::needs_barrier`]
//! after each block and synchronizes all cores before calling
//! [`OooCore::take_barrier`]. [`OooCore::leave`] and [`OooCore::join`] take a core out
//! of and back into that synchronized execution.

use std::sync::Arc;

use tracing::{debug, trace};

use super::frontend::{FetchTiming, FrontEnd};
use super::pipeline::{
    CycleQueue, ForwardingTable, IssueWindow, RegScoreboard, ReorderBuffer, ResourceTracker,
};
use super::recorder::ContentionRecorder;
use super::uop::{BasicBlock, BranchRecord, UopKind};
use crate::common::ConfigError;
use crate::common::constants::{DECODE_STAGE, ISSUE_TO_DISPATCH, L1D_LAT, NO_ADDR};
use crate::config::CoreConfig;
use crate::mem::{MemoryPort, PhaseClock};
use crate::stats::CoreStats;
use crate::trace::{CoreTracer, TraceKind, TraceSink};

/// Cycles computed for one simulated micro-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UopTiming {
    /// Timing class of the micro-op.
    pub kind: UopKind,
    /// Cycle the micro-op entered the issue window.
    pub issue_cycle: u64,
    /// Cycle execution started.
    pub dispatch_cycle: u64,
    /// Cycle the result became visible and the micro-op retired.
    pub commit_cycle: u64,
}

/// A recorded data access of the block being executed.
#[derive(Clone, Copy, Debug)]
struct MemOp {
    addr: u64,
    size: u32,
}

/// Builder for [`OooCore`].
///
/// The instruction and data cache ports and the phase clock are required.
pub struct OooCoreBuilder {
    name: String,
    core_id: u32,
    config: CoreConfig,
    l1i: Option<Arc<dyn MemoryPort>>,
    l1d: Option<Arc<dyn MemoryPort>>,
    clock: Option<Arc<PhaseClock>>,
    trace_sink: Option<TraceSink>,
    trace_ifetch: bool,
}

impl std::fmt::Debug for OooCoreBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OooCoreBuilder")
            .field("name", &self.name)
            .field("core_id", &self.core_id)
            .field("config", &self.config)
            .field("l1i", &self.l1i.is_some())
            .field("l1d", &self.l1d.is_some())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl OooCoreBuilder {
    /// Sets the core index used in traces and requests.
    #[must_use]
    pub const fn core_id(mut self, core_id: u32) -> Self {
        self.core_id = core_id;
        self
    }

    /// Sets the pipeline geometry.
    #[must_use]
    pub fn core_config(mut self, config: &CoreConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Sets the instruction cache port.
    #[must_use]
    pub fn l1i(mut self, port: Arc<dyn MemoryPort>) -> Self {
        self.l1i = Some(port);
        self
    }

    /// Sets the data cache port.
    #[must_use]
    pub fn l1d(mut self, port: Arc<dyn MemoryPort>) -> Self {
        self.l1d = Some(port);
        self
    }

    /// Sets the shared phase clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<PhaseClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Writes every data access of this core to `sink`.
    #[must_use]
    pub fn trace_sink(mut self, sink: TraceSink) -> Self {
        self.trace_sink = Some(sink);
        self
    }

    /// Also traces instruction fetches when a sink is set.
    #[must_use]
    pub const fn trace_ifetch(mut self, enabled: bool) -> Self {
        self.trace_ifetch = enabled;
        self
    }

    /// Builds the core.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if a cache port or the clock was not set, and
    /// [`ConfigError::Invalid`] for a geometry the trackers cannot be built with.
    pub fn build(self) -> Result<OooCore, ConfigError> {
        let l1i = self.l1i.ok_or(ConfigError::Missing("l1i"))?;
        let l1d = self.l1d.ok_or(ConfigError::Missing("l1d"))?;
        let clock = self.clock.ok_or(ConfigError::Missing("clock"))?;
        let config = &self.config;

        for (field, value) in [
            ("core.rob_entries", config.rob_entries),
            ("core.load_queue_entries", config.load_queue_entries),
            ("core.store_queue_entries", config.store_queue_entries),
            ("core.decode_queue_entries", config.decode_queue_entries),
            ("core.issue_window_entries", config.issue_window_entries),
            ("core.rob_retire_width", config.rob_retire_width as usize),
            ("core.lsq_retire_width", config.lsq_retire_width as usize),
            ("core.issue_width", config.issue_width as usize),
            ("core.rf_reads_per_cycle", config.rf_reads_per_cycle as usize),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be nonzero"));
            }
        }
        if !config.fwd_entries.is_power_of_two() {
            return Err(ConfigError::invalid(
                "core.fwd_entries",
                format!("{} is not a power of two", config.fwd_entries),
            ));
        }

        let phase_end_cycle = clock.global_phase_cycles() + clock.phase_length();
        Ok(OooCore {
            tracer: CoreTracer::new(self.trace_sink, self.core_id, self.trace_ifetch),
            name: self.name,
            core_id: self.core_id,
            thread_id: 0,
            frontend: FrontEnd::new(config, l1i),
            l1d,
            clock,
            rob: ReorderBuffer::new(config.rob_entries, config.rob_retire_width),
            load_queue: ReorderBuffer::new(config.load_queue_entries, config.lsq_retire_width),
            store_queue: ReorderBuffer::new(config.store_queue_entries, config.lsq_retire_width),
            uop_queue: CycleQueue::new(config.decode_queue_entries),
            window: IssueWindow::new(config.issue_window_entries),
            regs: RegScoreboard::new(),
            fwd: ForwardingTable::new(config.fwd_entries),
            recorder: ContentionRecorder::new(),
            issue_width: config.issue_width,
            rf_reads_per_cycle: config.rf_reads_per_cycle,
            cur_cycle: 0,
            decode_cycle: DECODE_STAGE,
            phase_end_cycle,
            cur_cycle_issued: 0,
            cur_cycle_rf_reads: 0,
            last_store_commit_cycle: 0,
            last_store_addr_commit_cycle: 0,
            last_commit_cycle: 0,
            prev_bbl: None,
            loads: Vec::new(),
            stores: Vec::new(),
            timings: Vec::new(),
            uops_since_access: 0,
            instrs: 0,
            uops: 0,
            bbls: 0,
            approx_instrs: 0,
            decode_stalls: 0,
            issue_stalls: 0,
            pred_false_mem_ops: 0,
        })
    }
}

/// Out-of-order core timing model.
pub struct OooCore {
    name: String,
    core_id: u32,
    thread_id: u32,

    frontend: FrontEnd,
    l1d: Arc<dyn MemoryPort>,
    clock: Arc<PhaseClock>,

    rob: ReorderBuffer,
    load_queue: ReorderBuffer,
    store_queue: ReorderBuffer,
    uop_queue: CycleQueue,
    window: IssueWindow,
    regs: RegScoreboard,
    fwd: ForwardingTable,
    recorder: ContentionRecorder,
    tracer: CoreTracer,

    issue_width: u32,
    rf_reads_per_cycle: u32,

    cur_cycle: u64,
    decode_cycle: u64,
    phase_end_cycle: u64,
    cur_cycle_issued: u32,
    cur_cycle_rf_reads: u32,

    last_store_commit_cycle: u64,
    last_store_addr_commit_cycle: u64,
    last_commit_cycle: u64,

    prev_bbl: Option<Arc<BasicBlock>>,
    loads: Vec<MemOp>,
    stores: Vec<MemOp>,
    timings: Vec<UopTiming>,
    /// Non-memory micro-ops since the last traced data access.
    uops_since_access: u64,

    instrs: u64,
    uops: u64,
    bbls: u64,
    approx_instrs: u64,
    decode_stalls: u64,
    issue_stalls: u64,
    pred_false_mem_ops: u64,
}

impl std::fmt::Debug for OooCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OooCore")
            .field("name", &self.name)
            .field("core_id", &self.core_id)
            .field("thread_id", &self.thread_id)
            .field("cur_cycle", &self.cur_cycle)
            .field("decode_cycle", &self.decode_cycle)
            .field("phase_end_cycle", &self.phase_end_cycle)
            .field("instrs", &self.instrs)
            .field("frontend", &self.frontend)
            .finish_non_exhaustive()
    }
}

impl OooCore {
    /// Starts building a core named `name`.
    pub fn builder(name: impl Into<String>) -> OooCoreBuilder {
        OooCoreBuilder {
            name: name.into(),
            core_id: 0,
            config: CoreConfig::default(),
            l1i: None,
            l1d: None,
            clock: None,
            trace_sink: None,
            trace_ifetch: false,
        }
    }

    /// Core name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Core index.
    pub const fn core_id(&self) -> u32 {
        self.core_id
    }

    /// Current issue cycle.
    pub const fn cur_cycle(&self) -> u64 {
        self.cur_cycle
    }

    /// Decode cycle of the next micro-op.
    pub const fn decode_cycle(&self) -> u64 {
        self.decode_cycle
    }

    /// Commit cycle of the last simulated micro-op.
    pub const fn last_commit_cycle(&self) -> u64 {
        self.last_commit_cycle
    }

    /// Instructions simulated.
    pub const fn instrs(&self) -> u64 {
        self.instrs
    }

    /// Micro-ops simulated.
    pub const fn uops(&self) -> u64 {
        self.uops
    }

    /// Basic blocks simulated.
    pub const fn bbls(&self) -> u64 {
        self.bbls
    }

    /// Branches predicted wrong.
    pub const fn mispred_branches(&self) -> u64 {
        self.frontend.mispred_branches()
    }

    /// Per-micro-op cycles of the most recently simulated block.
    pub fn last_block_timings(&self) -> &[UopTiming] {
        &self.timings
    }

    /// Records a load executed by the current block.
    pub fn record_load(&mut self, addr: u64, size: u32) {
        self.loads.push(MemOp { addr, size });
    }

    /// Records a store executed by the current block.
    pub fn record_store(&mut self, addr: u64, size: u32) {
        self.stores.push(MemOp { addr, size });
    }

    /// Records a predicated-off memory operation.
    ///
    /// It occupies the next load slot of the block and completes without
    /// accessing memory.
    pub fn record_pred_false_mem_op(&mut self) {
        self.pred_false_mem_ops += 1;
        self.loads.push(MemOp {
            addr: NO_ADDR,
            size: 0,
        });
    }

    /// Records the outcome of the branch ending the current block.
    pub const fn branch_outcome(&mut self, pc: u64, taken: bool, taken_npc: u64, not_taken_npc: u64) {
        self.frontend.record_branch(BranchRecord {
            pc,
            taken,
            taken_npc,
            not_taken_npc,
        });
    }

    /// Simulates the buffered block and buffers `bbl`.
    ///
    /// The first call after construction or a context switch only buffers `bbl`.
    ///
    /// # Panics
    ///
    /// Panics if the number of recorded loads or stores differs from the number of
    /// load or store micro-ops of the simulated block.
    pub fn advance(&mut self, bbl: Arc<BasicBlock>) {
        let next = Arc::clone(&bbl);
        let Some(prev) = self.prev_bbl.replace(bbl) else {
            self.loads.clear();
            self.stores.clear();
            self.frontend.clear_branch();
            trace!(core = %self.name, addr = next.addr, "first block buffered");
            return;
        };

        self.simulate_block(&prev);

        let timing = FetchTiming {
            cur_cycle: self.cur_cycle,
            decode_cycle: self.decode_cycle,
            last_commit_cycle: self.last_commit_cycle,
            instrs: self.instrs,
        };
        self.decode_cycle = self
            .frontend
            .fetch(&next, timing, &mut self.tracer, &mut self.recorder);
    }

    const fn reset_cycle_budgets(&mut self) {
        self.cur_cycle_issued = 0;
        self.cur_cycle_rf_reads = 0;
    }

    fn simulate_block(&mut self, bbl: &BasicBlock) {
        assert_eq!(
            self.loads.len(),
            bbl.loads(),
            "block {:#x}: load micro-ops and recorded loads out of sync",
            bbl.addr
        );
        assert_eq!(
            self.stores.len(),
            bbl.stores(),
            "block {:#x}: store micro-ops and recorded stores out of sync",
            bbl.addr
        );
        self.timings.clear();
        let mut load_idx = 0;
        let mut store_idx = 0;
        let mut prev_dec_cycle = 0;

        for uop in &bbl.uops {
            // Decode
            let dec_cycle = u64::from(uop.dec_cycle);
            let dec_diff = dec_cycle.saturating_sub(prev_dec_cycle);
            self.decode_cycle = (self.decode_cycle + dec_diff).max(self.uop_queue.min_alloc_cycle());
            if self.decode_cycle > self.cur_cycle {
                let stall = self.decode_cycle - self.cur_cycle;
                self.decode_stalls += stall;
                self.reset_cycle_budgets();
                for _ in 0..stall {
                    self.window.advance_pos(&mut self.cur_cycle);
                }
            }
            prev_dec_cycle = dec_cycle;
            self.uop_queue.mark_leave(self.cur_cycle);

            // Issue width
            if self.cur_cycle_issued >= self.issue_width {
                self.issue_stalls += 1;
                self.reset_cycle_budgets();
                self.window.advance_pos(&mut self.cur_cycle);
            }
            self.cur_cycle_issued += 1;

            // Register file reads; operands produced this cycle or later come off the bypass.
            let (c0, c1) = self.regs.sources_ready(uop.rs, self.cur_cycle);
            self.cur_cycle_rf_reads +=
                u32::from(c0 < self.cur_cycle) + u32::from(c1 < self.cur_cycle);
            if self.cur_cycle_rf_reads > self.rf_reads_per_cycle {
                self.issue_stalls += 1;
                self.cur_cycle_rf_reads -= self.rf_reads_per_cycle;
                self.cur_cycle_issued = 0;
                self.window.advance_pos(&mut self.cur_cycle);
            }

            // Dispatch
            let mut dispatch_cycle = c0
                .max(c1)
                .max(self.rob.min_alloc_cycle().max(self.cur_cycle) + ISSUE_TO_DISPATCH);
            let prev_cur_cycle = self.cur_cycle;
            self.window.schedule(
                &mut self.cur_cycle,
                &mut dispatch_cycle,
                uop.port_mask,
                u32::from(uop.extra_slots),
            );
            if self.cur_cycle != prev_cur_cycle {
                self.reset_cycle_budgets();
            }
            let issue_cycle = self.cur_cycle;

            // Execute and commit
            let commit_cycle = match uop.kind {
                UopKind::General => {
                    self.uops_since_access += 1;
                    dispatch_cycle + u64::from(uop.lat)
                }
                UopKind::Load => {
                    dispatch_cycle = dispatch_cycle
                        .max(self.load_queue.min_alloc_cycle())
                        .max(self.last_store_addr_commit_cycle + 1);
                    let op = self.loads[load_idx];
                    load_idx += 1;

                    let mut resp_cycle = dispatch_cycle;
                    if op.addr != NO_ADDR {
                        resp_cycle = self.l1d.load(op.addr, dispatch_cycle, self.instrs) + L1D_LAT;
                        self.recorder.record(dispatch_cycle, resp_cycle);
                        resp_cycle = self.fwd.forward(op.addr, resp_cycle);
                        self.tracer
                            .access(self.uops_since_access, TraceKind::Load, op.addr, op.size);
                        self.uops_since_access = 0;
                    }
                    self.load_queue.mark_retire(resp_cycle);
                    resp_cycle
                }
                UopKind::Store => {
                    dispatch_cycle = dispatch_cycle
                        .max(self.store_queue.min_alloc_cycle())
                        .max(self.last_store_addr_commit_cycle + 1);
                    let op = self.stores[store_idx];
                    store_idx += 1;

                    let mut resp_cycle = dispatch_cycle;
                    if op.addr != NO_ADDR {
                        resp_cycle = self.l1d.store(op.addr, dispatch_cycle, self.instrs) + L1D_LAT;
                        self.recorder.record(dispatch_cycle, resp_cycle);
                        self.fwd.record_store(op.addr, resp_cycle);
                        self.tracer
                            .access(self.uops_since_access, TraceKind::Store, op.addr, op.size);
                        self.uops_since_access = 0;
                    }
                    self.last_store_commit_cycle = self.last_store_commit_cycle.max(resp_cycle);
                    self.store_queue.mark_retire(resp_cycle);
                    resp_cycle
                }
                UopKind::StoreAddr => {
                    self.uops_since_access += 1;
                    let commit = dispatch_cycle + u64::from(uop.lat);
                    self.last_store_addr_commit_cycle =
                        self.last_store_addr_commit_cycle.max(commit);
                    commit
                }
                UopKind::Fence => {
                    self.uops_since_access += 1;
                    let commit = dispatch_cycle + u64::from(uop.lat);
                    self.last_store_addr_commit_cycle = commit
                        .max(self.last_store_addr_commit_cycle)
                        .max(self.last_store_commit_cycle + u64::from(uop.lat));
                    commit
                }
            };

            // Retire
            self.rob.mark_retire(commit_cycle);
            self.regs.stamp(uop.rd[0], commit_cycle);
            self.regs.stamp(uop.rd[1], commit_cycle);
            self.last_commit_cycle = commit_cycle;
            self.timings.push(UopTiming {
                kind: uop.kind,
                issue_cycle,
                dispatch_cycle,
                commit_cycle,
            });
        }

        self.loads.clear();
        self.stores.clear();

        let instrs = u64::from(bbl.instrs);
        self.instrs += instrs;
        self.uops += bbl.uops.len() as u64;
        self.bbls += 1;
        if bbl.approx {
            self.approx_instrs += instrs;
        }
        trace!(
            core = %self.name,
            addr = bbl.addr,
            cur_cycle = self.cur_cycle,
            last_commit = self.last_commit_cycle,
            "block simulated"
        );
    }

    /// Switches the software context.
    ///
    /// `None` deschedules the current context: the buffered block is dropped and
    /// both cache ports forget their lines. `Some(thread)` names the context that
    /// runs from now on.
    pub fn context_switch(&mut self, thread: Option<u32>) {
        match thread {
            None => {
                self.prev_bbl = None;
                self.loads.clear();
                self.stores.clear();
                self.frontend.clear_branch();
                self.frontend.l1i().context_switch();
                self.l1d.context_switch();
                debug!(core = %self.name, cur_cycle = self.cur_cycle, "context switched out");
            }
            Some(thread_id) => {
                self.thread_id = thread_id;
                self.tracer.set_thread(thread_id);
                debug!(core = %self.name, thread_id, "context switched in");
            }
        }
    }

    /// Moves the core to `target_cycle` without simulating the cycles in between.
    fn fast_forward(&mut self, target_cycle: u64) {
        debug!(
            core = %self.name,
            from = self.cur_cycle,
            to = target_cycle,
            "fast forward"
        );
        self.decode_cycle += target_cycle - self.cur_cycle;
        self.window.long_advance(&mut self.cur_cycle, target_cycle);
        self.reset_cycle_budgets();
    }

    /// Rejoins synchronized execution.
    ///
    /// The core skips to the global phase cycle if it fell behind while halted, plus
    /// any pending contention delay, and its phase ends one phase length after the
    /// current global phase.
    pub fn join(&mut self) {
        let target = self
            .recorder
            .notify_join(self.cur_cycle, self.clock.global_phase_cycles());
        if target > self.cur_cycle {
            self.fast_forward(target);
        }
        self.phase_end_cycle = self.clock.global_phase_cycles() + self.clock.phase_length();
        debug!(core = %self.name, cur_cycle = self.cur_cycle, phase_end = self.phase_end_cycle, "join");
    }

    /// Leaves synchronized execution.
    pub fn leave(&mut self) {
        self.recorder.notify_leave(self.cur_cycle);
    }

    /// Opens a contention window, applying any delay it returns.
    pub fn cs_start(&mut self) {
        let target = self.recorder.cs_start(self.cur_cycle);
        if target > self.cur_cycle {
            self.fast_forward(target);
        }
    }

    /// Closes a contention window, applying pending contention delay.
    pub fn cs_end(&mut self) {
        let target = self.recorder.cs_end(self.cur_cycle);
        if target > self.cur_cycle {
            self.fast_forward(target);
        }
    }

    /// Queues contention delay, applied at the next join or contention window end.
    pub const fn add_contention(&mut self, cycles: u64) {
        self.recorder.add_contention(cycles);
    }

    /// Returns `true` once the core ran past the end of its phase.
    pub const fn needs_barrier(&self) -> bool {
        self.cur_cycle > self.phase_end_cycle
    }

    /// Moves the phase end forward by one phase after a barrier.
    pub fn take_barrier(&mut self) {
        self.phase_end_cycle += self.clock.phase_length();
    }

    /// Counters for statistics reporting.
    pub fn stats(&self) -> CoreStats {
        CoreStats {
            name: self.name.clone(),
            cycles: self.cur_cycle,
            unhalted_cycles: self.recorder.unhalted_cycles(self.cur_cycle),
            contention_cycles: self.recorder.contention_cycles(),
            instrs: self.instrs,
            uops: self.uops,
            bbls: self.bbls,
            approx_instrs: self.approx_instrs,
            mispred_branches: self.frontend.mispred_branches(),
            branches: self.frontend.branches(),
            wrong_path_fetches: self.frontend.wrong_path_fetches(),
            fetch_stalls: self.frontend.fetch_stalls(),
            decode_stalls: self.decode_stalls,
            issue_stalls: self.issue_stalls,
            pred_false_mem_ops: self.pred_false_mem_ops,
            mem_accesses: self.recorder.accesses(),
            mem_access_cycles: self.recorder.access_cycles(),
        }
    }
}
