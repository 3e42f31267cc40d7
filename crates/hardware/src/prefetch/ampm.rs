//! Access Map Pattern Matching (AMPM) Prefetcher.
//!
//! Keeps two bitmaps per tracked page: lines demand-accessed and lines already
//! prefetched. After marking each demand access, it looks for strides the page has
//! already shown and extends them past the current offset, in both directions.
//!
//! For the current offset `o` and a distance `i`, the candidate `o + i` is
//! prefetched when `o - i` was accessed too (so `o - i`, `o`, `o + i` form a run).
//! The negative direction mirrors this. Candidates already accessed or prefetched
//! are skipped, and each direction issues at most `degree` prefetches per access.

use tracing::trace;

use super::Prefetcher;
use crate::common::constants::{LINES_PER_PAGE, PAGE_LINE_BITS};
use crate::stats::PrefetchStats;

/// Largest stride distance examined.
const MAX_DISTANCE: i32 = 16;

#[derive(Clone, Copy, Debug, Default)]
struct AmpmPage {
    page: Option<u64>,
    lru: u64,
    access_map: u64,
    pf_map: u64,
}

impl AmpmPage {
    const fn accessed(&self, pos: i32) -> bool {
        self.access_map & (1 << pos) != 0
    }

    const fn prefetched(&self, pos: i32) -> bool {
        self.pf_map & (1 << pos) != 0
    }
}

/// AMPM prefetcher state.
#[derive(Clone, Debug)]
pub struct AmpmPrefetcher {
    pages: Vec<AmpmPage>,
    degree: usize,
    stats: PrefetchStats,
}

impl AmpmPrefetcher {
    /// Creates a prefetcher tracking `pages` pages with `degree` prefetches per direction.
    ///
    /// # Panics
    ///
    /// Panics if `pages` is zero.
    pub fn new(pages: usize, degree: usize) -> Self {
        assert!(pages > 0, "AMPM prefetcher needs at least one page");
        Self {
            pages: vec![AmpmPage::default(); pages],
            degree,
            stats: PrefetchStats::default(),
        }
    }

    /// Index of `page`, replacing the least recently used page on a miss.
    fn lookup(&mut self, page: u64) -> usize {
        if let Some(idx) = self.pages.iter().position(|p| p.page == Some(page)) {
            self.stats.page_hits += 1;
            return idx;
        }
        let idx = self
            .pages
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| p.lru)
            .map_or(0, |(i, _)| i);
        self.pages[idx] = AmpmPage {
            page: Some(page),
            ..AmpmPage::default()
        };
        self.stats.page_allocs += 1;
        trace!(page, idx, "ampm prefetcher: page allocated");
        idx
    }

    /// Scans one direction (`dir` is +1 or -1) and issues prefetches.
    fn scan(
        &mut self,
        idx: usize,
        offset: i32,
        dir: i32,
        page_base: u64,
        issue: &mut dyn FnMut(u64) -> u64,
    ) {
        let mut issued = 0;
        for i in 1..=MAX_DISTANCE {
            let behind = offset - dir * i;
            let candidate = offset + dir * i;
            if !(0..LINES_PER_PAGE as i32).contains(&behind)
                || !(0..LINES_PER_PAGE as i32).contains(&candidate)
            {
                break;
            }
            if issued >= self.degree {
                break;
            }

            let entry = &self.pages[idx];
            if entry.accessed(candidate) || entry.prefetched(candidate) {
                continue;
            }
            if entry.accessed(behind) {
                let _ = issue(page_base + candidate as u64);
                self.pages[idx].pf_map |= 1 << candidate;
                self.stats.prefetches += 1;
                issued += 1;
            }
        }
    }
}

impl Prefetcher for AmpmPrefetcher {
    fn on_demand(
        &mut self,
        line_addr: u64,
        req_cycle: u64,
        resp_cycle: u64,
        issue: &mut dyn FnMut(u64) -> u64,
    ) -> u64 {
        self.stats.accesses += 1;
        let page = line_addr >> PAGE_LINE_BITS;
        let offset = (line_addr & (LINES_PER_PAGE as u64 - 1)) as i32;
        let page_base = page << PAGE_LINE_BITS;

        let idx = self.lookup(page);
        let entry = &mut self.pages[idx];
        entry.lru = req_cycle;
        if entry.prefetched(offset) {
            self.stats.hits += 1;
        }
        entry.access_map |= 1 << offset;

        self.scan(idx, offset, 1, page_base, issue);
        self.scan(idx, offset, -1, page_base, issue);
        resp_cycle
    }

    fn stats(&self) -> PrefetchStats {
        self.stats.clone()
    }
}
