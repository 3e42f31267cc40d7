//! Configuration system for the timing model.
//!
//! This module defines all configuration structures and enums used to parameterize
//! the model. It provides:
//! 1. **Defaults:** Baseline core geometry, cache sizes, and channel parameters.
//! 2. **Structures:** Hierarchical config for the core, cache levels, memory channel, and run.
//! 3. **Enums:** Branch predictor, prefetcher, and memory controller types.
//!
//! Configuration is supplied as JSON; use `Config::default()` when none is given.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::common::ConfigError;

/// Default configuration constants for the model.
///
/// These values describe a four-wide core with a 128-entry reorder buffer in
/// front of a single shared cache and one memory channel.
mod defaults {
    /// Reorder buffer entries.
    pub const ROB_ENTRIES: usize = 128;

    /// Micro-ops the reorder buffer can retire per cycle.
    pub const ROB_RETIRE_WIDTH: u32 = 4;

    /// Load queue entries.
    pub const LOAD_QUEUE_ENTRIES: usize = 32;

    /// Store queue entries.
    pub const STORE_QUEUE_ENTRIES: usize = 32;

    /// Entries the load and store queues can retire per cycle.
    pub const LSQ_RETIRE_WIDTH: u32 = 4;

    /// Decoded micro-op queue entries between decode and issue.
    pub const DECODE_QUEUE_ENTRIES: usize = 28;

    /// Issue window (reservation station) entries.
    pub const ISSUE_WINDOW_ENTRIES: usize = 36;

    /// Micro-ops issued per cycle.
    pub const ISSUE_WIDTH: u32 = 4;

    /// Register file read ports per cycle.
    pub const RF_READS_PER_CYCLE: u32 = 3;

    /// Store-to-load forwarding table entries (power of two).
    pub const FWD_ENTRIES: usize = 32;

    /// Bytes fetched down the wrong path after a misprediction (five 64-byte lines).
    pub const WRONG_PATH_BYTES: u64 = 320;

    /// Instruction fetch bandwidth in bytes per cycle.
    pub const FETCH_BYTES_PER_CYCLE: u64 = 16;

    /// First-level cache size in bytes (32 KiB).
    pub const L1_SIZE: usize = 32 * 1024;

    /// Cache line size in bytes.
    pub const CACHE_LINE: usize = 64;

    /// First-level tag check latency charged on misses only.
    pub const L1_LATENCY: u64 = 0;

    /// Shared cache size in bytes (2 MiB).
    pub const L2_SIZE: usize = 2 * 1024 * 1024;

    /// Shared cache associativity.
    pub const L2_WAYS: usize = 16;

    /// Shared cache access latency in cycles.
    pub const L2_LATENCY: u64 = 10;

    /// Prefetches per direction per trigger for the AMPM prefetcher.
    pub const PREFETCH_DEGREE: usize = 2;

    /// Pages tracked by the AMPM prefetcher.
    pub const AMPM_PAGES: usize = 64;

    /// Zero-load memory latency in cycles.
    pub const MEMORY_LATENCY: u64 = 100;

    /// Bytes moved per memory request.
    pub const REQUEST_BYTES: u64 = 64;

    /// Core clock in megacycles per second.
    pub const MEGACYCLES_PER_SECOND: u64 = 2000;

    /// Channel bandwidth in megabytes per second.
    pub const MEGABYTES_PER_SECOND: u64 = 6400;

    /// Cycles per synchronization phase.
    pub const PHASE_LENGTH: u64 = 10_000;

    /// Minimum cycles between queueing-model latency updates.
    pub const MIN_UPDATE_CYCLES: u64 = 10_000;
}

/// Memory controller implementation types.
///
/// Specifies how the main memory channel turns a request into a completion cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MemoryController {
    /// Fixed-latency channel.
    ///
    /// Every read completes after the zero-load latency regardless of traffic.
    Simple,
    /// M/D/1 queueing channel.
    ///
    /// Latency grows with the measured request rate relative to peak bandwidth.
    #[default]
    #[serde(alias = "MD1")]
    Md1,
}

/// Hardware prefetcher types placed in front of the shared cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Prefetcher {
    /// No prefetching enabled.
    #[default]
    None,
    /// Per-page stride detector with confidence counters.
    Stride,
    /// Access map pattern matching.
    ///
    /// Keeps per-page bitmaps of accessed and prefetched lines and prefetches
    /// lines that extend observed strides.
    #[serde(alias = "AMPM")]
    Ampm,
}

/// Branch prediction algorithm types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BranchPredictor {
    /// Always predicts not-taken.
    Static,
    /// Global history XOR PC into a 2-bit counter table.
    GShare,
    /// Per-address history registers indexing a global pattern table.
    #[default]
    #[serde(alias = "PAg")]
    Pag,
}

/// Root configuration structure containing all model settings.
///
/// # Examples
///
/// ```
/// use ooosim_core::config::{BranchPredictor, Config, Prefetcher};
///
/// let json = r#"{
///     "core": { "rob_entries": 192, "branch_predictor": "GShare" },
///     "cache": { "l2": { "prefetcher": "Stride" } },
///     "memory": { "controller": "Simple", "latency": 80 }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.core.rob_entries, 192);
/// assert_eq!(config.core.issue_width, 4);
/// assert_eq!(config.core.branch_predictor, BranchPredictor::GShare);
/// assert_eq!(config.cache.l2.prefetcher, Prefetcher::Stride);
/// assert_eq!(config.memory.latency, 80);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Core geometry and widths
    #[serde(default)]
    pub core: CoreConfig,
    /// Cache hierarchy configuration
    #[serde(default)]
    pub cache: CacheHierarchyConfig,
    /// Main memory channel configuration
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Phase length and tracing
    #[serde(default)]
    pub sim: SimConfig,
}

impl Config {
    /// Parses and validates a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and [`ConfigError::Invalid`]
    /// when a value fails [`Config::validate`].
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
    /// errors of [`Config::from_json`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Checks every value the timing structures depend on.
    ///
    /// # Errors
    ///
    /// Returns the first offending field as [`ConfigError::Invalid`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let core = &self.core;
        nonzero("core.rob_entries", core.rob_entries)?;
        nonzero("core.rob_retire_width", core.rob_retire_width as usize)?;
        nonzero("core.load_queue_entries", core.load_queue_entries)?;
        nonzero("core.store_queue_entries", core.store_queue_entries)?;
        nonzero("core.lsq_retire_width", core.lsq_retire_width as usize)?;
        nonzero("core.decode_queue_entries", core.decode_queue_entries)?;
        nonzero("core.issue_window_entries", core.issue_window_entries)?;
        nonzero("core.issue_width", core.issue_width as usize)?;
        nonzero("core.rf_reads_per_cycle", core.rf_reads_per_cycle as usize)?;
        nonzero("core.fetch_bytes_per_cycle", core.fetch_bytes_per_cycle as usize)?;
        power_of_two("core.fwd_entries", core.fwd_entries)?;

        power_of_two("cache.l1i.line_bytes", self.cache.l1i.line_bytes)?;
        power_of_two("cache.l1d.line_bytes", self.cache.l1d.line_bytes)?;
        if self.cache.l1i.sets() == 0 {
            return Err(ConfigError::invalid(
                "cache.l1i.size_bytes",
                "must hold at least one line",
            ));
        }
        if self.cache.l1d.sets() == 0 {
            return Err(ConfigError::invalid(
                "cache.l1d.size_bytes",
                "must hold at least one line",
            ));
        }

        // Levels exchange line addresses, so they must agree on the line size.
        let line_bytes = self.cache.l1d.line_bytes;
        same_line("cache.l1i.line_bytes", self.cache.l1i.line_bytes, line_bytes)?;

        let l2 = &self.cache.l2;
        if l2.enabled {
            power_of_two("cache.l2.line_bytes", l2.line_bytes)?;
            same_line("cache.l2.line_bytes", l2.line_bytes, line_bytes)?;
            nonzero("cache.l2.ways", l2.ways)?;
            if l2.sets() == 0 {
                return Err(ConfigError::invalid(
                    "cache.l2.size_bytes",
                    format!("must hold at least {} lines", l2.ways),
                ));
            }
        }
        if l2.prefetcher == Prefetcher::Ampm {
            nonzero("cache.l2.ampm_pages", l2.ampm_pages)?;
            nonzero("cache.l2.prefetch_degree", l2.prefetch_degree)?;
        }

        let mem = &self.memory;
        nonzero("memory.request_bytes", mem.request_bytes as usize)?;
        nonzero("memory.megacycles_per_second", mem.megacycles_per_second as usize)?;
        if mem.controller == MemoryController::Md1 && mem.max_requests_per_cycle() <= 0.0 {
            return Err(ConfigError::invalid(
                "memory.megabytes_per_second",
                "channel must sustain a nonzero request rate",
            ));
        }

        nonzero("sim.phase_length", self.sim.phase_length as usize)?;
        Ok(())
    }
}

fn nonzero(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(field, "must be nonzero"));
    }
    Ok(())
}

fn power_of_two(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if !value.is_power_of_two() {
        return Err(ConfigError::invalid(
            field,
            format!("{value} is not a power of two"),
        ));
    }
    Ok(())
}

fn same_line(
    field: &'static str,
    value: usize,
    l1d_line_bytes: usize,
) -> Result<(), ConfigError> {
    if value != l1d_line_bytes {
        return Err(ConfigError::invalid(
            field,
            format!("{value} differs from cache.l1d.line_bytes ({l1d_line_bytes})"),
        ));
    }
    Ok(())
}

/// Out-of-order core geometry.
#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    /// Reorder buffer entries
    #[serde(default = "CoreConfig::default_rob_entries")]
    pub rob_entries: usize,

    /// Reorder buffer retirements per cycle
    #[serde(default = "CoreConfig::default_rob_retire_width")]
    pub rob_retire_width: u32,

    /// Load queue entries
    #[serde(default = "CoreConfig::default_load_queue_entries")]
    pub load_queue_entries: usize,

    /// Store queue entries
    #[serde(default = "CoreConfig::default_store_queue_entries")]
    pub store_queue_entries: usize,

    /// Load/store queue retirements per cycle
    #[serde(default = "CoreConfig::default_lsq_retire_width")]
    pub lsq_retire_width: u32,

    /// Decoded micro-op queue entries
    #[serde(default = "CoreConfig::default_decode_queue_entries")]
    pub decode_queue_entries: usize,

    /// Issue window entries
    #[serde(default = "CoreConfig::default_issue_window_entries")]
    pub issue_window_entries: usize,

    /// Micro-ops issued per cycle
    #[serde(default = "CoreConfig::default_issue_width")]
    pub issue_width: u32,

    /// Register file read ports per cycle
    #[serde(default = "CoreConfig::default_rf_reads")]
    pub rf_reads_per_cycle: u32,

    /// Store-to-load forwarding entries
    #[serde(default = "CoreConfig::default_fwd_entries")]
    pub fwd_entries: usize,

    /// Bytes fetched down the wrong path on a misprediction
    #[serde(default = "CoreConfig::default_wrong_path_bytes")]
    pub wrong_path_bytes: u64,

    /// Fetch bandwidth in bytes per cycle
    #[serde(default = "CoreConfig::default_fetch_bytes")]
    pub fetch_bytes_per_cycle: u64,

    /// Branch predictor algorithm
    #[serde(default)]
    pub branch_predictor: BranchPredictor,
}

impl CoreConfig {
    fn default_rob_entries() -> usize {
        defaults::ROB_ENTRIES
    }

    fn default_rob_retire_width() -> u32 {
        defaults::ROB_RETIRE_WIDTH
    }

    fn default_load_queue_entries() -> usize {
        defaults::LOAD_QUEUE_ENTRIES
    }

    fn default_store_queue_entries() -> usize {
        defaults::STORE_QUEUE_ENTRIES
    }

    fn default_lsq_retire_width() -> u32 {
        defaults::LSQ_RETIRE_WIDTH
    }

    fn default_decode_queue_entries() -> usize {
        defaults::DECODE_QUEUE_ENTRIES
    }

    fn default_issue_window_entries() -> usize {
        defaults::ISSUE_WINDOW_ENTRIES
    }

    fn default_issue_width() -> u32 {
        defaults::ISSUE_WIDTH
    }

    fn default_rf_reads() -> u32 {
        defaults::RF_READS_PER_CYCLE
    }

    fn default_fwd_entries() -> usize {
        defaults::FWD_ENTRIES
    }

    fn default_wrong_path_bytes() -> u64 {
        defaults::WRONG_PATH_BYTES
    }

    fn default_fetch_bytes() -> u64 {
        defaults::FETCH_BYTES_PER_CYCLE
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            rob_entries: defaults::ROB_ENTRIES,
            rob_retire_width: defaults::ROB_RETIRE_WIDTH,
            load_queue_entries: defaults::LOAD_QUEUE_ENTRIES,
            store_queue_entries: defaults::STORE_QUEUE_ENTRIES,
            lsq_retire_width: defaults::LSQ_RETIRE_WIDTH,
            decode_queue_entries: defaults::DECODE_QUEUE_ENTRIES,
            issue_window_entries: defaults::ISSUE_WINDOW_ENTRIES,
            issue_width: defaults::ISSUE_WIDTH,
            rf_reads_per_cycle: defaults::RF_READS_PER_CYCLE,
            fwd_entries: defaults::FWD_ENTRIES,
            wrong_path_bytes: defaults::WRONG_PATH_BYTES,
            fetch_bytes_per_cycle: defaults::FETCH_BYTES_PER_CYCLE,
            branch_predictor: BranchPredictor::default(),
        }
    }
}

/// Cache hierarchy configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheHierarchyConfig {
    /// Core-private instruction filter cache
    #[serde(default)]
    pub l1i: FilterCacheConfig,
    /// Core-private data filter cache
    #[serde(default)]
    pub l1d: FilterCacheConfig,
    /// Shared cache and its prefetcher
    #[serde(default)]
    pub l2: SharedCacheConfig,
}

/// First-level (filter) cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterCacheConfig {
    /// Total size in bytes
    #[serde(default = "FilterCacheConfig::default_size")]
    pub size_bytes: usize,

    /// Line size in bytes
    #[serde(default = "FilterCacheConfig::default_line")]
    pub line_bytes: usize,

    /// Extra cycles charged before a miss reaches the next level
    #[serde(default = "FilterCacheConfig::default_latency")]
    pub latency: u64,
}

impl FilterCacheConfig {
    fn default_size() -> usize {
        defaults::L1_SIZE
    }

    fn default_line() -> usize {
        defaults::CACHE_LINE
    }

    fn default_latency() -> u64 {
        defaults::L1_LATENCY
    }

    /// Number of direct-mapped entries.
    pub const fn sets(&self) -> usize {
        if self.line_bytes == 0 {
            return 0;
        }
        self.size_bytes / self.line_bytes
    }
}

impl Default for FilterCacheConfig {
    fn default() -> Self {
        Self {
            size_bytes: defaults::L1_SIZE,
            line_bytes: defaults::CACHE_LINE,
            latency: defaults::L1_LATENCY,
        }
    }
}

/// Shared cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SharedCacheConfig {
    /// Enable the shared level; when disabled, misses go straight to memory
    #[serde(default = "SharedCacheConfig::default_enabled")]
    pub enabled: bool,

    /// Total size in bytes
    #[serde(default = "SharedCacheConfig::default_size")]
    pub size_bytes: usize,

    /// Line size in bytes
    #[serde(default = "SharedCacheConfig::default_line")]
    pub line_bytes: usize,

    /// Associativity (number of ways)
    #[serde(default = "SharedCacheConfig::default_ways")]
    pub ways: usize,

    /// Access latency in cycles
    #[serde(default = "SharedCacheConfig::default_latency")]
    pub latency: u64,

    /// Prefetcher in front of this level
    #[serde(default)]
    pub prefetcher: Prefetcher,

    /// Prefetches per direction per trigger (AMPM)
    #[serde(default = "SharedCacheConfig::default_prefetch_degree")]
    pub prefetch_degree: usize,

    /// Pages tracked (AMPM)
    #[serde(default = "SharedCacheConfig::default_ampm_pages")]
    pub ampm_pages: usize,
}

impl SharedCacheConfig {
    const fn default_enabled() -> bool {
        true
    }

    fn default_size() -> usize {
        defaults::L2_SIZE
    }

    fn default_line() -> usize {
        defaults::CACHE_LINE
    }

    fn default_ways() -> usize {
        defaults::L2_WAYS
    }

    fn default_latency() -> u64 {
        defaults::L2_LATENCY
    }

    fn default_prefetch_degree() -> usize {
        defaults::PREFETCH_DEGREE
    }

    fn default_ampm_pages() -> usize {
        defaults::AMPM_PAGES
    }

    /// Number of sets.
    pub const fn sets(&self) -> usize {
        if self.line_bytes == 0 || self.ways == 0 {
            return 0;
        }
        self.size_bytes / (self.line_bytes * self.ways)
    }
}

impl Default for SharedCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            size_bytes: defaults::L2_SIZE,
            line_bytes: defaults::CACHE_LINE,
            ways: defaults::L2_WAYS,
            latency: defaults::L2_LATENCY,
            prefetcher: Prefetcher::default(),
            prefetch_degree: defaults::PREFETCH_DEGREE,
            ampm_pages: defaults::AMPM_PAGES,
        }
    }
}

/// Main memory channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Controller type
    #[serde(default)]
    pub controller: MemoryController,

    /// Zero-load latency in cycles
    #[serde(default = "MemoryConfig::default_latency")]
    pub latency: u64,

    /// Bytes per request
    #[serde(default = "MemoryConfig::default_request_bytes")]
    pub request_bytes: u64,

    /// Core clock in megacycles per second
    #[serde(default = "MemoryConfig::default_mcps")]
    pub megacycles_per_second: u64,

    /// Channel bandwidth in megabytes per second
    #[serde(default = "MemoryConfig::default_mbps")]
    pub megabytes_per_second: u64,
}

impl MemoryConfig {
    fn default_latency() -> u64 {
        defaults::MEMORY_LATENCY
    }

    fn default_request_bytes() -> u64 {
        defaults::REQUEST_BYTES
    }

    fn default_mcps() -> u64 {
        defaults::MEGACYCLES_PER_SECOND
    }

    fn default_mbps() -> u64 {
        defaults::MEGABYTES_PER_SECOND
    }

    /// Peak requests per cycle the channel sustains.
    pub fn max_requests_per_cycle(&self) -> f64 {
        if self.megacycles_per_second == 0 || self.request_bytes == 0 {
            return 0.0;
        }
        let bytes_per_cycle = self.megabytes_per_second as f64 / self.megacycles_per_second as f64;
        bytes_per_cycle / self.request_bytes as f64
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            controller: MemoryController::default(),
            latency: defaults::MEMORY_LATENCY,
            request_bytes: defaults::REQUEST_BYTES,
            megacycles_per_second: defaults::MEGACYCLES_PER_SECOND,
            megabytes_per_second: defaults::MEGABYTES_PER_SECOND,
        }
    }
}

/// Run-level settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    /// Cycles per synchronization phase
    #[serde(default = "SimConfig::default_phase_length")]
    pub phase_length: u64,

    /// Minimum cycles between channel latency updates
    #[serde(default = "SimConfig::default_min_update_cycles")]
    pub min_update_cycles: u64,

    /// Write a load/store access trace to this file
    #[serde(default)]
    pub trace_path: Option<PathBuf>,

    /// Also trace instruction fetches
    #[serde(default)]
    pub trace_ifetch: bool,
}

impl SimConfig {
    fn default_phase_length() -> u64 {
        defaults::PHASE_LENGTH
    }

    fn default_min_update_cycles() -> u64 {
        defaults::MIN_UPDATE_CYCLES
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            phase_length: defaults::PHASE_LENGTH,
            min_update_cycles: defaults::MIN_UPDATE_CYCLES,
            trace_path: None,
            trace_ifetch: false,
        }
    }
}
