//! Simulation statistics collection and reporting.
//!
//! This module gathers counters from every part of the model. It provides:
//! 1. **Core counters:** Instructions, micro-ops, blocks, mispredictions, stall cycles,
//!    and memory access latency totals.
//! 2. **Cache counters:** Hits, misses, write-backs, and invalidations per level.
//! 3. **Prefetch counters:** Issued prefetches, page hits, short hits, and stride switches.
//! 4. **Channel counters:** Reads, writes, latency totals, and queueing-model updates.
//! 5. **Reporting:** Section-selectable text output.

use std::fmt::{self, Write as _};
use std::time::Instant;

/// Per-core counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoreStats {
    /// Core name.
    pub name: String,
    /// Current cycle of the core.
    pub cycles: u64,
    /// Cycles spent executing, excluding halted gaps.
    pub unhalted_cycles: u64,
    /// Cycles of injected contention delay.
    pub contention_cycles: u64,
    /// Architectural instructions simulated.
    pub instrs: u64,
    /// Micro-ops simulated.
    pub uops: u64,
    /// Basic blocks simulated.
    pub bbls: u64,
    /// Instructions from approximately decoded blocks.
    pub approx_instrs: u64,
    /// Conditional branches predicted wrong.
    pub mispred_branches: u64,
    /// Conditional branches resolved.
    pub branches: u64,
    /// Instruction cache lines fetched down mispredicted paths.
    pub wrong_path_fetches: u64,
    /// Cycles the decoder waited on fetch.
    pub fetch_stalls: u64,
    /// Cycles issue waited on decode or the decode queue.
    pub decode_stalls: u64,
    /// Cycles lost to the issue width and register file read ports.
    pub issue_stalls: u64,
    /// Loads without an address (predicated off).
    pub pred_false_mem_ops: u64,
    /// Data accesses and instruction line fetches sent to the hierarchy.
    pub mem_accesses: u64,
    /// Sum of their latencies.
    pub mem_access_cycles: u64,
}

impl CoreStats {
    /// Instructions per unhalted cycle.
    pub fn ipc(&self) -> f64 {
        if self.unhalted_cycles == 0 {
            return 0.0;
        }
        self.instrs as f64 / self.unhalted_cycles as f64
    }

    /// Mean latency of a memory access, in cycles.
    pub fn avg_access_latency(&self) -> f64 {
        if self.mem_accesses == 0 {
            return 0.0;
        }
        self.mem_access_cycles as f64 / self.mem_accesses as f64
    }
}

/// Per-level cache counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Level name.
    pub name: String,
    /// Lookups that found the line.
    pub hits: u64,
    /// Lookups that went to the parent.
    pub misses: u64,
    /// Dirty victims written back.
    pub writebacks: u64,
    /// Lines dropped by invalidation or eviction.
    pub invalidations: u64,
    /// Lines installed on behalf of a prefetcher.
    pub prefetch_fills: u64,
}

impl CacheStats {
    /// Fraction of lookups that missed, in percent.
    pub fn miss_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        100.0 * self.misses as f64 / total as f64
    }
}

/// Prefetcher counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrefetchStats {
    /// Prefetcher name.
    pub name: String,
    /// Demand reads observed.
    pub accesses: u64,
    /// Prefetches issued, including double prefetches.
    pub prefetches: u64,
    /// Second prefetches issued after a short hit.
    pub double_prefetches: u64,
    /// Demand reads to a tracked page.
    pub page_hits: u64,
    /// Pages (re)allocated.
    pub page_allocs: u64,
    /// Demand reads that found their line prefetched.
    pub hits: u64,
    /// Prefetch hits whose prefetch was still in flight.
    pub short_hits: u64,
    /// Learned strides replaced.
    pub stride_switches: u64,
    /// Matching-stride reads below the confidence threshold.
    pub low_conf_accesses: u64,
}

/// Memory channel counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Channel name.
    pub name: String,
    /// Reads served.
    pub reads: u64,
    /// Dirty write-backs received.
    pub writes: u64,
    /// Sum of read latencies.
    pub total_read_latency: u64,
    /// Sum of write latencies.
    pub total_write_latency: u64,
    /// Queueing-model latency recomputations.
    pub latency_updates: u64,
    /// Recomputations whose load was clamped.
    pub clamped_loads: u64,
    /// Sum of measured loads in percent, one sample per recomputation.
    pub load_histogram_sum: u64,
    /// Latency currently charged to reads.
    pub current_latency: u64,
}

impl ChannelStats {
    /// Mean read latency.
    pub fn avg_read_latency(&self) -> f64 {
        if self.reads == 0 {
            return 0.0;
        }
        self.total_read_latency as f64 / self.reads as f64
    }

    /// Mean measured load in percent.
    pub fn avg_load(&self) -> f64 {
        if self.latency_updates == 0 {
            return 0.0;
        }
        self.load_histogram_sum as f64 / self.latency_updates as f64
    }
}

/// Section names for selective stats output.
///
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "core", "branch", "cache", "prefetch", "memory"];

const RULE: &str = "==========================================================";
const THIN_RULE: &str = "----------------------------------------------------------";

/// Statistics of a whole run.
#[derive(Clone, Debug)]
pub struct SimStats {
    start_time: Instant,
    /// One entry per core.
    pub cores: Vec<CoreStats>,
    /// First-level and shared caches.
    pub caches: Vec<CacheStats>,
    /// Prefetcher, if configured.
    pub prefetch: Option<PrefetchStats>,
    /// Memory channel.
    pub channel: ChannelStats,
}

impl Default for SimStats {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl SimStats {
    /// Creates empty statistics for a run that started at `start_time`.
    pub const fn new(start_time: Instant) -> Self {
        Self {
            start_time,
            cores: Vec::new(),
            caches: Vec::new(),
            prefetch: None,
            channel: ChannelStats {
                name: String::new(),
                reads: 0,
                writes: 0,
                total_read_latency: 0,
                total_write_latency: 0,
                latency_updates: 0,
                clamped_loads: 0,
                load_histogram_sum: 0,
                current_latency: 0,
            },
        }
    }

    /// Instructions summed over all cores.
    pub fn total_instrs(&self) -> u64 {
        self.cores.iter().map(|c| c.instrs).sum()
    }

    /// Writes the requested sections to `out`.
    ///
    /// Each element of `sections` should be one of [`STATS_SECTIONS`]; an empty
    /// slice selects all of them.
    ///
    /// # Errors
    ///
    /// Propagates write errors from `out`.
    pub fn write_sections(&self, out: &mut impl fmt::Write, sections: &[String]) -> fmt::Result {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);

        if want("summary") {
            let seconds = self.start_time.elapsed().as_secs_f64().max(f64::EPSILON);
            let cycles = self.cores.iter().map(|c| c.cycles).max().unwrap_or(0);
            let instrs = self.total_instrs();
            writeln!(out, "\n{RULE}")?;
            writeln!(out, "OUT-OF-ORDER TIMING MODEL STATISTICS")?;
            writeln!(out, "{RULE}")?;
            writeln!(out, "host_seconds             {seconds:.4} s")?;
            writeln!(out, "sim_cores                {}", self.cores.len())?;
            writeln!(out, "sim_cycles               {cycles}")?;
            writeln!(out, "sim_insts                {instrs}")?;
            writeln!(
                out,
                "sim_kips                 {:.2}",
                instrs as f64 / seconds / 1000.0
            )?;
            writeln!(out, "{THIN_RULE}")?;
        }
        if want("core") {
            writeln!(out, "CORE BREAKDOWN")?;
            for c in &self.cores {
                writeln!(
                    out,
                    "  {:<8} cycles: {:<10} | insts: {:<10} | ipc: {:.4}",
                    c.name,
                    c.unhalted_cycles,
                    c.instrs,
                    c.ipc()
                )?;
                writeln!(
                    out,
                    "           uops: {:<10} | bbls: {:<10} | approx: {}",
                    c.uops, c.bbls, c.approx_instrs
                )?;
                writeln!(
                    out,
                    "           stalls.fetch: {} | stalls.decode: {} | stalls.issue: {} | contention: {}",
                    c.fetch_stalls, c.decode_stalls, c.issue_stalls, c.contention_cycles
                )?;
                writeln!(
                    out,
                    "           mem.accesses: {} | mem.avg_latency: {:.2}",
                    c.mem_accesses,
                    c.avg_access_latency()
                )?;
            }
            writeln!(out, "{THIN_RULE}")?;
        }
        if want("branch") {
            writeln!(out, "BRANCH PREDICTION")?;
            for c in &self.cores {
                let acc = if c.branches > 0 {
                    100.0 * (c.branches - c.mispred_branches) as f64 / c.branches as f64
                } else {
                    0.0
                };
                writeln!(
                    out,
                    "  {:<8} lookups: {:<10} | mispredicts: {:<10} | accuracy: {acc:.2}%",
                    c.name, c.branches, c.mispred_branches
                )?;
            }
            writeln!(out, "{THIN_RULE}")?;
        }
        if want("cache") {
            writeln!(out, "CACHES")?;
            for c in &self.caches {
                writeln!(
                    out,
                    "  {:<8} accesses: {:<10} | hits: {:<10} | miss_rate: {:.2}% | wb: {}",
                    c.name,
                    c.hits + c.misses,
                    c.hits,
                    c.miss_rate(),
                    c.writebacks
                )?;
            }
            writeln!(out, "{THIN_RULE}")?;
        }
        if want("prefetch") {
            if let Some(p) = &self.prefetch {
                writeln!(out, "PREFETCHER ({})", p.name)?;
                writeln!(out, "  pf.accesses            {}", p.accesses)?;
                writeln!(out, "  pf.issued              {}", p.prefetches)?;
                writeln!(out, "  pf.double              {}", p.double_prefetches)?;
                writeln!(out, "  pf.page_hits           {}", p.page_hits)?;
                writeln!(out, "  pf.hits                {}", p.hits)?;
                writeln!(out, "  pf.short_hits          {}", p.short_hits)?;
                writeln!(out, "  pf.stride_switches     {}", p.stride_switches)?;
                writeln!(out, "  pf.low_conf            {}", p.low_conf_accesses)?;
                writeln!(out, "{THIN_RULE}")?;
            }
        }
        if want("memory") {
            let ch = &self.channel;
            writeln!(out, "MEMORY CHANNEL ({})", ch.name)?;
            writeln!(out, "  mem.reads              {}", ch.reads)?;
            writeln!(out, "  mem.writes             {}", ch.writes)?;
            writeln!(out, "  mem.avg_read_latency   {:.2}", ch.avg_read_latency())?;
            writeln!(out, "  mem.latency            {}", ch.current_latency)?;
            writeln!(out, "  mem.updates            {}", ch.latency_updates)?;
            writeln!(out, "  mem.avg_load           {:.2}%", ch.avg_load())?;
            writeln!(out, "  mem.clamped            {}", ch.clamped_loads)?;
        }
        writeln!(out, "{RULE}")
    }

    /// Prints only the requested statistics sections to stdout.
    ///
    /// # Arguments
    ///
    /// * `sections` - Slice of section names to print, or empty for all.
    pub fn print_sections(&self, sections: &[String]) {
        let mut out = String::new();
        if self.write_sections(&mut out, sections).is_ok() {
            print!("{out}");
        }
    }

    /// Prints all statistics sections to stdout.
    ///
    /// Equivalent to `print_sections(&[])`.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}
