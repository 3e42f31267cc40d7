//! Core-private filter cache.
//!
//! The first level seen by a core is a direct-mapped array of line tags that
//! answers hits without touching any shared structure. Each entry remembers:
//! 1. **Read Tag:** The line readable from this entry.
//! 2. **Write Tag:** The line writable from this entry (only after a store miss).
//! 3. **Available Cycle:** When the fill for the current line completes.
//!
//! Misses go to the parent level as `Gets` (loads) or `Getx` (stores). Entries are
//! dropped by parent invalidations and by context switches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{InvReq, Invalidate, MemObject, MemReq, MemoryPort};
use crate::common::constants::NO_ADDR;
use crate::common::{ConfigError, ReqFlags, ReqType};
use crate::config::FilterCacheConfig;
use crate::stats::CacheStats;

#[derive(Clone, Copy, Debug)]
struct FilterEntry {
    rd_addr: u64,
    wr_addr: u64,
    avail_cycle: u64,
}

impl FilterEntry {
    const EMPTY: Self = Self {
        rd_addr: NO_ADDR,
        wr_addr: NO_ADDR,
        avail_cycle: 0,
    };
}

#[derive(Debug, Default)]
struct FilterCounters {
    load_hits: AtomicU64,
    load_misses: AtomicU64,
    store_hits: AtomicU64,
    store_misses: AtomicU64,
    invalidations: AtomicU64,
}

/// Direct-mapped core-private first level.
pub struct FilterCache {
    name: String,
    core_id: u32,
    line_bits: u32,
    set_mask: u64,
    latency: u64,
    flags: ReqFlags,
    entries: Mutex<Vec<FilterEntry>>,
    parent: Arc<dyn MemObject>,
    counters: FilterCounters,
}

impl std::fmt::Debug for FilterCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterCache")
            .field("name", &self.name)
            .field("core_id", &self.core_id)
            .field("line_bits", &self.line_bits)
            .field("parent", &self.parent.name())
            .finish_non_exhaustive()
    }
}

impl FilterCache {
    /// Creates an empty filter cache in front of `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the line size is not a power of two or
    /// the cache holds no line.
    pub fn new(
        name: impl Into<String>,
        core_id: u32,
        config: &FilterCacheConfig,
        parent: Arc<dyn MemObject>,
    ) -> Result<Self, ConfigError> {
        if !config.line_bytes.is_power_of_two() {
            return Err(ConfigError::invalid(
                "cache.l1.line_bytes",
                format!("{} is not a power of two", config.line_bytes),
            ));
        }
        let sets = config.sets();
        if !sets.is_power_of_two() {
            return Err(ConfigError::invalid(
                "cache.l1.size_bytes",
                format!("{sets} lines is not a nonzero power of two"),
            ));
        }
        Ok(Self {
            name: name.into(),
            core_id,
            line_bits: config.line_bytes.trailing_zeros(),
            set_mask: sets as u64 - 1,
            latency: config.latency,
            flags: ReqFlags::NONE,
            entries: Mutex::new(vec![FilterEntry::EMPTY; sets]),
            parent,
            counters: FilterCounters::default(),
        })
    }

    /// Tags every miss of this cache with `flags`.
    #[must_use]
    pub const fn with_flags(mut self, flags: ReqFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Name used in statistics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hit and miss counters.
    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        let load_hits = c.load_hits.load(Ordering::Relaxed);
        let store_hits = c.store_hits.load(Ordering::Relaxed);
        let load_misses = c.load_misses.load(Ordering::Relaxed);
        let store_misses = c.store_misses.load(Ordering::Relaxed);
        CacheStats {
            name: self.name.clone(),
            hits: load_hits + store_hits,
            misses: load_misses + store_misses,
            invalidations: c.invalidations.load(Ordering::Relaxed),
            ..CacheStats::default()
        }
    }

    #[inline]
    const fn index(&self, line_addr: u64) -> usize {
        (line_addr & self.set_mask) as usize
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<FilterEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetches `line_addr` from the parent and installs it.
    ///
    /// The array lock is released while the parent works, since the parent may
    /// invalidate lines in this cache on the way.
    fn replace(&self, line_addr: u64, is_load: bool, cycle: u64) -> u64 {
        let mut req = MemReq::new(
            line_addr,
            if is_load { ReqType::Gets } else { ReqType::Getx },
            cycle + self.latency,
        )
        .with_flags(self.flags)
        .with_core(self.core_id);
        let resp = self.parent.access(&mut req);

        let idx = self.index(line_addr);
        let mut entries = self.lock();
        let e = &mut entries[idx];
        let old_addr = e.rd_addr;
        e.wr_addr = if is_load { NO_ADDR } else { line_addr };
        e.rd_addr = line_addr;
        // A store upgrade of a line already readable keeps its fill cycle, so
        // loads can keep bypassing the store.
        if old_addr != line_addr {
            e.avail_cycle = resp;
        }
        resp
    }
}

impl MemoryPort for FilterCache {
    fn load(&self, addr: u64, cycle: u64, _instrs: u64) -> u64 {
        let line_addr = addr >> self.line_bits;
        let idx = self.index(line_addr);
        {
            let entries = self.lock();
            let e = &entries[idx];
            if e.rd_addr == line_addr {
                let _ = self.counters.load_hits.fetch_add(1, Ordering::Relaxed);
                return cycle.max(e.avail_cycle);
            }
        }
        let _ = self.counters.load_misses.fetch_add(1, Ordering::Relaxed);
        self.replace(line_addr, true, cycle)
    }

    fn store(&self, addr: u64, cycle: u64, _instrs: u64) -> u64 {
        let line_addr = addr >> self.line_bits;
        let idx = self.index(line_addr);
        {
            let entries = self.lock();
            let e = &entries[idx];
            if e.wr_addr == line_addr {
                let _ = self.counters.store_hits.fetch_add(1, Ordering::Relaxed);
                return cycle.max(e.avail_cycle);
            }
        }
        let _ = self.counters.store_misses.fetch_add(1, Ordering::Relaxed);
        self.replace(line_addr, false, cycle)
    }

    fn context_switch(&self) {
        self.lock().fill(FilterEntry::EMPTY);
    }

    fn line_bits(&self) -> u32 {
        self.line_bits
    }
}

impl Invalidate for FilterCache {
    fn invalidate(&self, req: &InvReq) -> u64 {
        let idx = self.index(req.line_addr);
        let mut entries = self.lock();
        let e = &mut entries[idx];
        if e.rd_addr == req.line_addr {
            e.rd_addr = NO_ADDR;
            e.wr_addr = NO_ADDR;
            let _ = self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        }
        req.cycle
    }
}
