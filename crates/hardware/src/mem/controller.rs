//! Memory channel implementations for latency modeling.
//!
//! This module provides:
//! 1. **SimpleMemory:** Fixed latency per read (no contention modeling).
//! 2. **Md1Memory:** An M/D/1 queue whose latency follows the measured load on the
//!    channel, recomputed at phase boundaries.
//!
//! Channels are `Send + Sync`; every core's misses end up here concurrently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use super::{MemObject, MemReq, PhaseClock};
use crate::common::ReqType;
use crate::config::MemoryConfig;
use crate::stats::ChannelStats;

/// Highest channel utilization the queueing formula is evaluated at.
pub const MAX_LOAD: f64 = 0.95;

/// M/D/1 latency at utilization `load`, clamped to `[0, MAX_LOAD]`.
///
/// # Arguments
///
/// * `zero_load_latency` - Latency of an idle channel.
/// * `load` - Requests per cycle divided by the channel's peak requests per cycle.
///
/// # Returns
///
/// `(1 + 0.5 * load / (1 - load)) * zero_load_latency`, truncated.
pub fn md1_latency(zero_load_latency: u64, load: f64) -> u64 {
    let load = load.clamp(0.0, MAX_LOAD);
    let multiplier = 1.0 + 0.5 * load / (1.0 - load);
    (multiplier * zero_load_latency as f64) as u64
}

/// Traffic counters shared by both channel kinds.
#[derive(Debug, Default)]
struct ChannelCounters {
    reads: AtomicU64,
    writes: AtomicU64,
    read_latency: AtomicU64,
    write_latency: AtomicU64,
}

impl ChannelCounters {
    fn count_read(&self, latency: u64) {
        let _ = self.reads.fetch_add(1, Ordering::Relaxed);
        let _ = self.read_latency.fetch_add(latency, Ordering::Relaxed);
    }

    fn count_write(&self, latency: u64) {
        let _ = self.writes.fetch_add(1, Ordering::Relaxed);
        let _ = self.write_latency.fetch_add(latency, Ordering::Relaxed);
    }

    fn snapshot(&self, name: &str) -> ChannelStats {
        ChannelStats {
            name: name.to_owned(),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            total_read_latency: self.read_latency.load(Ordering::Relaxed),
            total_write_latency: self.write_latency.load(Ordering::Relaxed),
            ..ChannelStats::default()
        }
    }
}

/// Fixed-latency memory channel.
#[derive(Debug)]
pub struct SimpleMemory {
    name: String,
    latency: u64,
    counters: ChannelCounters,
}

impl SimpleMemory {
    /// Creates a channel where reads and dirty write-backs take `latency` cycles.
    pub fn new(name: impl Into<String>, latency: u64) -> Self {
        Self {
            name: name.into(),
            latency,
            counters: ChannelCounters::default(),
        }
    }

    /// Traffic counters.
    pub fn stats(&self) -> ChannelStats {
        let mut stats = self.counters.snapshot(&self.name);
        stats.current_latency = self.latency;
        stats
    }
}

impl MemObject for SimpleMemory {
    fn access(&self, req: &mut MemReq) -> u64 {
        req.state = req.granted_state();
        match req.req_type {
            ReqType::Puts => req.cycle,
            ReqType::Putx => {
                self.counters.count_write(self.latency);
                req.cycle + self.latency
            }
            ReqType::Gets | ReqType::Getx => {
                self.counters.count_read(self.latency);
                req.cycle + self.latency
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Smoothed load estimate, updated at most once per phase.
#[derive(Debug)]
struct LoadEstimate {
    /// Exponentially smoothed requests per update interval.
    smoothed_accesses: f64,
    /// Sum of every measured load, in percent.
    load_histogram_sum: u64,
    latency_updates: u64,
    clamped_loads: u64,
}

/// M/D/1 queueing memory channel.
///
/// Reads are timed with the latency computed at the last update. When the global
/// phase count moves past the last update, the first access of the new phase
/// recomputes the latency from the reads counted since then.
#[derive(Debug)]
pub struct Md1Memory {
    name: String,
    zero_load_latency: u64,
    max_requests_per_cycle: f64,
    min_update_cycles: u64,
    clock: Arc<PhaseClock>,
    last_phase: AtomicU64,
    cur_latency: AtomicU64,
    cur_phase_accesses: AtomicU64,
    estimate: Mutex<LoadEstimate>,
    counters: ChannelCounters,
}

impl Md1Memory {
    /// Creates a channel from its configuration.
    ///
    /// # Arguments
    ///
    /// * `name` - Name used in statistics.
    /// * `config` - Zero-load latency, request size, and bandwidth.
    /// * `min_update_cycles` - Shortest interval the latency is recomputed over.
    /// * `clock` - Shared phase clock.
    pub fn new(
        name: impl Into<String>,
        config: &MemoryConfig,
        min_update_cycles: u64,
        clock: Arc<PhaseClock>,
    ) -> Self {
        Self {
            name: name.into(),
            zero_load_latency: config.latency,
            max_requests_per_cycle: config.max_requests_per_cycle(),
            min_update_cycles,
            last_phase: AtomicU64::new(clock.num_phases()),
            clock,
            cur_latency: AtomicU64::new(config.latency),
            cur_phase_accesses: AtomicU64::new(0),
            estimate: Mutex::new(LoadEstimate {
                smoothed_accesses: 0.0,
                load_histogram_sum: 0,
                latency_updates: 0,
                clamped_loads: 0,
            }),
            counters: ChannelCounters::default(),
        }
    }

    /// Latency charged to reads right now.
    pub fn current_latency(&self) -> u64 {
        self.cur_latency.load(Ordering::Acquire)
    }

    /// Traffic and latency-model counters.
    pub fn stats(&self) -> ChannelStats {
        let est = self.estimate.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stats = self.counters.snapshot(&self.name);
        stats.latency_updates = est.latency_updates;
        stats.clamped_loads = est.clamped_loads;
        stats.load_histogram_sum = est.load_histogram_sum;
        stats.current_latency = self.current_latency();
        stats
    }

    /// Recomputes the latency if at least one phase passed since the last update.
    fn maybe_update(&self) {
        let num_phases = self.clock.num_phases();
        if num_phases <= self.last_phase.load(Ordering::Acquire) {
            return;
        }
        let mut est = self.estimate.lock().unwrap_or_else(PoisonError::into_inner);
        // Another core may have updated while this one waited for the lock.
        let last_phase = self.last_phase.load(Ordering::Acquire);
        if num_phases > last_phase {
            self.update_latency(&mut est, num_phases, last_phase);
        }
    }

    fn update_latency(&self, est: &mut LoadEstimate, num_phases: u64, last_phase: u64) {
        let phase_cycles = (num_phases - last_phase) * self.clock.phase_length();
        if phase_cycles < self.min_update_cycles {
            return;
        }

        let accesses = self.cur_phase_accesses.swap(0, Ordering::AcqRel);
        est.smoothed_accesses = 0.5 * accesses as f64 + 0.5 * est.smoothed_accesses;
        let requests_per_cycle = est.smoothed_accesses / phase_cycles as f64;
        let mut load = requests_per_cycle / self.max_requests_per_cycle;
        if load > MAX_LOAD {
            warn!(
                channel = %self.name,
                load,
                "memory channel load exceeds {MAX_LOAD}, clamping"
            );
            load = MAX_LOAD;
            est.clamped_loads += 1;
        }

        let latency = md1_latency(self.zero_load_latency, load);
        est.load_histogram_sum += (load * 100.0) as u64;
        est.latency_updates += 1;
        self.cur_latency.store(latency, Ordering::Release);
        self.last_phase.store(num_phases, Ordering::Release);
        debug!(
            channel = %self.name,
            accesses,
            load,
            latency,
            "memory channel latency updated"
        );
    }
}

impl MemObject for Md1Memory {
    fn access(&self, req: &mut MemReq) -> u64 {
        self.maybe_update();
        req.state = req.granted_state();
        match req.req_type {
            // Write-backs drain in the background and are not part of the load sample.
            ReqType::Puts => req.cycle,
            ReqType::Putx => {
                self.counters.count_write(0);
                req.cycle
            }
            ReqType::Gets | ReqType::Getx => {
                let latency = self.current_latency();
                let _ = self.cur_phase_accesses.fetch_add(1, Ordering::AcqRel);
                self.counters.count_read(latency);
                req.cycle + latency
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
