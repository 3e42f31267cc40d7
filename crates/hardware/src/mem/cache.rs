//! Shared set-associative timing cache.
//!
//! A cache level shared by every core. It keeps tags and dirty bits only and
//! answers with completion cycles. It provides:
//! 1. **Lookup:** Hits complete after the access latency.
//! 2. **Fill:** Misses go to the parent at `cycle + latency`; an empty way is filled
//!    first, otherwise the LRU way is evicted.
//! 3. **Inclusion:** Evicting a line invalidates it in every child; dirty victims are
//!    written back to the parent with `Putx`.
//! 4. **Prefetch Fills:** Requests flagged `PREFETCH` install the line but grant no
//!    permission to the requester.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::{Children, InvReq, Invalidate, MemObject, MemReq};
use crate::common::{ConfigError, LineState, ReqFlags, ReqType};
use crate::config::SharedCacheConfig;
use crate::stats::CacheStats;

/// Least Recently Used ordering of the ways of every set.
///
/// Index 0 of each usage stack is MRU, the last index is LRU.
#[derive(Clone, Debug)]
struct LruStacks {
    usage: Vec<Vec<usize>>,
}

impl LruStacks {
    fn new(sets: usize, ways: usize) -> Self {
        Self {
            usage: (0..sets).map(|_| (0..ways).collect()).collect(),
        }
    }

    /// Moves `way` to the MRU position.
    fn touch(&mut self, set: usize, way: usize) {
        let stack = &mut self.usage[set];
        if let Some(pos) = stack.iter().position(|&x| x == way) {
            let _ = stack.remove(pos);
        }
        stack.insert(0, way);
    }

    fn victim(&self, set: usize) -> usize {
        self.usage[set].last().copied().unwrap_or(0)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Line {
    tag: Option<u64>,
    dirty: bool,
}

#[derive(Debug)]
struct CacheArray {
    lines: Vec<Line>,
    lru: LruStacks,
}

impl CacheArray {
    /// Least recently used empty way of `set`, else its LRU way.
    fn victim(&self, set: usize, base: usize) -> usize {
        self.lru.usage[set]
            .iter()
            .rev()
            .copied()
            .find(|&w| self.lines[base + w].tag.is_none())
            .unwrap_or_else(|| self.lru.victim(set))
    }
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    writebacks: AtomicU64,
    invalidations: AtomicU64,
    prefetch_fills: AtomicU64,
}

/// Shared cache level.
pub struct TimingCache {
    name: String,
    sets: usize,
    ways: usize,
    latency: u64,
    array: Mutex<CacheArray>,
    parent: Arc<dyn MemObject>,
    children: Children,
    counters: CacheCounters,
}

impl std::fmt::Debug for TimingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimingCache")
            .field("name", &self.name)
            .field("sets", &self.sets)
            .field("ways", &self.ways)
            .field("latency", &self.latency)
            .field("parent", &self.parent.name())
            .finish_non_exhaustive()
    }
}

impl TimingCache {
    /// Creates an empty cache in front of `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the geometry yields no set.
    pub fn new(
        name: impl Into<String>,
        config: &SharedCacheConfig,
        parent: Arc<dyn MemObject>,
    ) -> Result<Self, ConfigError> {
        let sets = config.sets();
        if sets == 0 {
            return Err(ConfigError::invalid(
                "cache.l2.size_bytes",
                "geometry yields no sets",
            ));
        }
        Ok(Self {
            name: name.into(),
            sets,
            ways: config.ways,
            latency: config.latency,
            array: Mutex::new(CacheArray {
                lines: vec![Line::default(); sets * config.ways],
                lru: LruStacks::new(sets, config.ways),
            }),
            parent,
            children: Children::new(),
            counters: CacheCounters::default(),
        })
    }

    /// Adds a holder that must drop lines this cache evicts.
    pub fn attach_child(&self, child: Weak<dyn Invalidate>) {
        self.children.attach(child);
    }

    /// Hit, miss and write-back counters.
    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            name: self.name.clone(),
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            writebacks: c.writebacks.load(Ordering::Relaxed),
            invalidations: c.invalidations.load(Ordering::Relaxed),
            prefetch_fills: c.prefetch_fills.load(Ordering::Relaxed),
        }
    }

    /// Returns `true` if `line_addr` is present.
    pub fn contains(&self, line_addr: u64) -> bool {
        let array = self.array.lock().unwrap_or_else(PoisonError::into_inner);
        self.find(&array, line_addr).is_some()
    }

    #[inline]
    const fn set_of(&self, line_addr: u64) -> usize {
        (line_addr % self.sets as u64) as usize
    }

    fn find(&self, array: &CacheArray, line_addr: u64) -> Option<usize> {
        let base = self.set_of(line_addr) * self.ways;
        (0..self.ways).find(|&w| array.lines[base + w].tag == Some(line_addr))
    }

    /// Serves a read or exclusive read.
    fn read(&self, req: &mut MemReq) -> u64 {
        let set = self.set_of(req.line_addr);
        let base = set * self.ways;
        let mut array = self.array.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(way) = self.find(&array, req.line_addr) {
            let _ = self.counters.hits.fetch_add(1, Ordering::Relaxed);
            array.lru.touch(set, way);
            if req.req_type == ReqType::Getx {
                array.lines[base + way].dirty = true;
            }
            return req.cycle + self.latency;
        }

        let _ = self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let way = array.victim(set, base);
        let victim = array.lines[base + way];
        if let Some(victim_addr) = victim.tag {
            self.evict(victim_addr, victim.dirty, req);
        }

        let mut fill = MemReq::new(req.line_addr, req.req_type, req.cycle + self.latency)
            .with_flags(req.flags)
            .with_core(req.core_id);
        let resp = self.parent.access(&mut fill);

        array.lines[base + way] = Line {
            tag: Some(req.line_addr),
            dirty: req.req_type == ReqType::Getx,
        };
        array.lru.touch(set, way);
        resp
    }

    fn evict(&self, victim_addr: u64, dirty: bool, req: &MemReq) {
        let inv = InvReq {
            line_addr: victim_addr,
            cycle: req.cycle,
        };
        let _ = self.children.invalidate_all(&inv);
        let _ = self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        if dirty {
            let _ = self.counters.writebacks.fetch_add(1, Ordering::Relaxed);
            let mut wb = MemReq::new(victim_addr, ReqType::Putx, req.cycle).with_core(req.core_id);
            let _ = self.parent.access(&mut wb);
        }
    }

    /// Absorbs a write-back from a child.
    fn writeback(&self, req: &mut MemReq) -> u64 {
        if req.req_type == ReqType::Puts {
            return req.cycle;
        }
        let mut array = self.array.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(way) = self.find(&array, req.line_addr) {
            let base = self.set_of(req.line_addr) * self.ways;
            array.lines[base + way].dirty = true;
            return req.cycle + self.latency;
        }
        drop(array);
        // Not held here: pass it down.
        let mut wb = *req;
        self.parent.access(&mut wb)
    }
}

impl MemObject for TimingCache {
    fn access(&self, req: &mut MemReq) -> u64 {
        let resp = if req.req_type.is_writeback() {
            self.writeback(req)
        } else {
            self.read(req)
        };
        if req.is(ReqFlags::PREFETCH) {
            let _ = self.counters.prefetch_fills.fetch_add(1, Ordering::Relaxed);
            req.state = LineState::Invalid;
        } else {
            req.state = req.granted_state();
        }
        resp
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Invalidate for TimingCache {
    fn invalidate(&self, req: &InvReq) -> u64 {
        {
            let mut array = self.array.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(way) = self.find(&array, req.line_addr) {
                let base = self.set_of(req.line_addr) * self.ways;
                array.lines[base + way] = Line::default();
            }
        }
        self.children.invalidate_all(req)
    }
}
