//! Stride Prefetcher.
//!
//! Tracks up to sixteen pages. Each entry learns the stride between consecutive
//! demand offsets within its page and, once confident, runs ahead of the demand
//! stream one prefetch at a time. It keeps, per page:
//! 1. **Offsets:** The last two demand offsets and the last prefetched offset.
//! 2. **Stride and Confidence:** A learned stride with a 3-bit saturating counter.
//! 3. **In-flight Prefetches:** Which offsets were prefetched and when each completes.
//!
//! A demand read that lands on a prefetched offset completes no earlier than that
//! prefetch. If the prefetch was still in flight (a short hit) the entry is falling
//! behind, and a second prefetch is issued to deepen the run-ahead.
//!
//! # Performance
//!
//! - **Time Complexity:** O(T) per access for the tag match, T = 16
//! - **Space Complexity:** O(T × 64) completion cycles
//! - **Best Case:** Regular strided patterns within a page
//! - **Worst Case:** Pointer chasing, where every page sees one access

use tracing::trace;

use super::Prefetcher;
use crate::common::constants::{LINES_PER_PAGE, PAGE_LINE_BITS};
use crate::stats::PrefetchStats;

/// Pages tracked.
const ENTRIES: usize = 16;

/// Entries whose last completion lies more than this many cycles past a new
/// request still have prefetches in flight and are never replaced.
const WARM_CYCLES: u64 = 500;

/// Prefetch run-ahead beyond which short hits no longer trigger a second prefetch.
const MAX_DOUBLE_DEPTH: i32 = 8;

/// 3-bit saturating confidence counter predicting at 2 or above.
#[derive(Clone, Copy, Debug, Default)]
struct Confidence(u8);

impl Confidence {
    const MAX: u8 = 7;
    const THRESHOLD: u8 = 2;

    const fn inc(&mut self) {
        if self.0 < Self::MAX {
            self.0 += 1;
        }
    }

    const fn dec(&mut self) {
        self.0 = self.0.saturating_sub(1);
    }

    const fn reset(&mut self) {
        self.0 = 0;
    }

    const fn pred(self) -> bool {
        self.0 >= Self::THRESHOLD
    }
}

/// Per-page stream state.
#[derive(Clone, Debug)]
struct Entry {
    page: Option<u64>,
    conf: Confidence,
    stride: i32,
    last_pos: i32,
    last_last_pos: i32,
    last_prefetch_pos: i32,
    last_cycle: u64,
    ts: u64,
    /// Offsets with a prefetch not yet consumed by a demand read.
    valid: u64,
    /// Completion cycle of the prefetch at each offset.
    pf_resp: [u64; LINES_PER_PAGE],
}

impl Entry {
    const fn empty() -> Self {
        Self {
            page: None,
            conf: Confidence(0),
            stride: 0,
            last_pos: 0,
            last_last_pos: 0,
            last_prefetch_pos: 0,
            last_cycle: 0,
            ts: 0,
            valid: 0,
            pf_resp: [0; LINES_PER_PAGE],
        }
    }

    fn alloc(&mut self, page: u64, pos: i32, cycle: u64, ts: u64) {
        *self = Self::empty();
        self.page = Some(page);
        self.last_pos = pos;
        self.last_cycle = cycle;
        self.ts = ts;
    }

    const fn is_valid(&self, pos: i32) -> bool {
        self.valid & (1 << pos) != 0
    }

    const fn mark(&mut self, pos: i32, resp: u64) {
        self.valid |= 1 << pos;
        self.pf_resp[pos as usize] = resp;
    }
}

/// Returns `true` if `pos` is an offset inside a page.
const fn in_page(pos: i32) -> bool {
    pos >= 0 && pos < LINES_PER_PAGE as i32
}

/// Stride prefetcher state.
#[derive(Clone, Debug)]
pub struct StridePrefetcher {
    entries: Vec<Entry>,
    /// Recency stamp; starts at 1 so a freshly allocated entry is never older than
    /// the untouched ones.
    timestamp: u64,
    stats: PrefetchStats,
}

impl Default for StridePrefetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl StridePrefetcher {
    /// Creates a prefetcher with every entry free.
    pub fn new() -> Self {
        Self {
            entries: vec![Entry::empty(); ENTRIES],
            timestamp: 1,
            stats: PrefetchStats::default(),
        }
    }

    fn next_ts(&mut self) -> u64 {
        let ts = self.timestamp;
        self.timestamp += 1;
        ts
    }

    /// Oldest entry not touched within the warm window, if any.
    fn victim(&self, req_cycle: u64) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.last_cycle <= req_cycle + WARM_CYCLES)
            .min_by_key(|(_, e)| e.ts)
            .map(|(i, _)| i)
    }
}

impl Prefetcher for StridePrefetcher {
    fn on_demand(
        &mut self,
        line_addr: u64,
        req_cycle: u64,
        resp_cycle: u64,
        issue: &mut dyn FnMut(u64) -> u64,
    ) -> u64 {
        self.stats.accesses += 1;
        let page = line_addr >> PAGE_LINE_BITS;
        let pos = (line_addr & (LINES_PER_PAGE as u64 - 1)) as i32;
        let page_base = page << PAGE_LINE_BITS;

        let Some(idx) = self.entries.iter().position(|e| e.page == Some(page)) else {
            if let Some(idx) = self.victim(req_cycle) {
                let ts = self.next_ts();
                self.entries[idx].alloc(page, pos, req_cycle, ts);
                self.stats.page_allocs += 1;
                trace!(page, idx, "stride prefetcher: page allocated");
            }
            return resp_cycle;
        };

        self.stats.page_hits += 1;
        let ts = self.next_ts();
        let mut resp_cycle = resp_cycle;
        let stats = &mut self.stats;
        let e = &mut self.entries[idx];
        e.ts = ts;

        let mut short_prefetch = false;
        if e.is_valid(pos) {
            let pf_resp = e.pf_resp[pos as usize];
            short_prefetch = pf_resp > resp_cycle;
            e.valid &= !(1 << pos);
            resp_cycle = resp_cycle.max(pf_resp);
            e.last_cycle = e.last_cycle.max(resp_cycle);
            stats.hits += 1;
            if short_prefetch {
                stats.short_hits += 1;
            }
        }

        let stride = pos - e.last_pos;
        if stride == e.stride {
            e.conf.inc();
            // A zero stride (same line again) has nothing to run ahead of.
            if e.conf.pred() && stride != 0 {
                let mut depth = (e.last_prefetch_pos - e.last_pos) / stride;
                let mut pf_pos = e.last_prefetch_pos + stride;
                if depth < 1 {
                    pf_pos = pos + stride;
                    depth = 1;
                }

                if in_page(pf_pos) && !e.is_valid(pf_pos) {
                    let resp = issue(page_base + pf_pos as u64);
                    e.mark(pf_pos, resp);
                    stats.prefetches += 1;

                    let next = pf_pos + stride;
                    if short_prefetch
                        && depth < MAX_DOUBLE_DEPTH
                        && in_page(next)
                        && !e.is_valid(next)
                    {
                        let resp = issue(page_base + next as u64);
                        e.mark(next, resp);
                        pf_pos = next;
                        stats.prefetches += 1;
                        stats.double_prefetches += 1;
                    }
                    e.last_prefetch_pos = pf_pos;
                }
            } else {
                stats.low_conf_accesses += 1;
            }
        } else {
            e.conf.dec();
            if !e.conf.pred() {
                // Re-lock quickly when the last two offsets already agree on the new stride.
                let last_stride = e.last_pos - e.last_last_pos;
                if stride != 0 && stride != e.stride && stride == last_stride {
                    e.conf.reset();
                    e.stride = stride;
                    stats.stride_switches += 1;
                    trace!(page, stride, "stride prefetcher: stride switch");
                }
            }
            e.last_prefetch_pos = pos;
        }

        e.last_last_pos = e.last_pos;
        e.last_pos = pos;
        resp_cycle
    }

    fn stats(&self) -> PrefetchStats {
        self.stats.clone()
    }
}
