//! Stride Prefetcher Tests.
//!
//! Verifies stride learning, confidence gating, run-ahead after short hits, and
//! page replacement.

use ooosim_core::prefetch::{Prefetcher, StridePrefetcher};
use pretty_assertions::assert_eq;

/// Line address of the first line of the page used throughout.
const PAGE: u64 = 0x1000;

/// Feeds demand reads at `offsets` of [`PAGE`], each completing at `resp`, and
/// returns the prefetched lines as page offsets together with the last response.
fn run(pf: &mut StridePrefetcher, offsets: &[u64], resp: u64, pf_resp: u64) -> (Vec<u64>, u64) {
    let mut issued = Vec::new();
    let mut last = 0;
    {
        let mut issue = |line: u64| {
            issued.push(line - PAGE);
            pf_resp
        };
        for &off in offsets {
            last = pf.on_demand(PAGE + off, 0, resp, &mut issue);
        }
    }
    (issued, last)
}

// ══════════════════════════════════════════════════════════
// 1. Training
// ══════════════════════════════════════════════════════════

/// A stride seen twice in a row is learned, and prefetching starts once
/// confidence reaches the threshold.
#[test]
fn learns_stride_then_prefetches_ahead() {
    let mut pf = StridePrefetcher::new();
    let (issued, _) = run(&mut pf, &[0, 4, 8, 0, 4, 8], 50, 1000);
    assert_eq!(issued, vec![12]);

    let stats = pf.stats();
    assert_eq!(stats.page_allocs, 1);
    assert_eq!(stats.page_hits, 5);
    assert_eq!(stats.stride_switches, 1);
    assert_eq!(stats.low_conf_accesses, 1);
    assert_eq!(stats.prefetches, 1);
}

/// Repeating the same line never issues a prefetch.
#[test]
fn zero_stride_issues_nothing() {
    let mut pf = StridePrefetcher::new();
    let (issued, _) = run(&mut pf, &[3; 10], 50, 1000);
    assert!(issued.is_empty());
    assert_eq!(pf.stats().stride_switches, 0);
}

// ══════════════════════════════════════════════════════════
// 2. Prefetch hits
// ══════════════════════════════════════════════════════════

/// A demand read that lands on an in-flight prefetch waits for it and triggers
/// a second prefetch to run further ahead.
#[test]
fn short_hit_waits_and_doubles_run_ahead() {
    let mut pf = StridePrefetcher::new();
    let _ = run(&mut pf, &[0, 4, 8, 0, 4, 8], 50, 1000);

    let (issued, resp) = run(&mut pf, &[12], 50, 1000);
    assert_eq!(resp, 1000);
    assert_eq!(issued, vec![16, 20]);

    let stats = pf.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.short_hits, 1);
    assert_eq!(stats.double_prefetches, 1);
    assert_eq!(stats.prefetches, 3);
}

/// A prefetch that completed before the demand read costs nothing extra.
#[test]
fn completed_prefetch_is_a_plain_hit() {
    let mut pf = StridePrefetcher::new();
    let _ = run(&mut pf, &[0, 4, 8, 0, 4, 8], 50, 20);

    let (issued, resp) = run(&mut pf, &[12], 50, 20);
    assert_eq!(resp, 50);
    assert_eq!(issued, vec![16]);

    let stats = pf.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.short_hits, 0);
    assert_eq!(stats.double_prefetches, 0);
}

/// Prefetches never leave the page.
#[test]
fn run_ahead_stops_at_page_end() {
    let mut pf = StridePrefetcher::new();
    let (issued, _) = run(&mut pf, &[40, 50, 60, 40, 50, 60], 50, 1000);
    assert!(issued.is_empty());
}

// ══════════════════════════════════════════════════════════
// 3. Replacement
// ══════════════════════════════════════════════════════════

/// The least recently used page is replaced once all entries are taken.
#[test]
fn oldest_page_is_replaced() {
    let mut pf = StridePrefetcher::new();
    let mut issue = |_line: u64| -> u64 { 0 };
    for page in 0..17u64 {
        let _ = pf.on_demand(page << 6, 0, 10, &mut issue);
    }
    // Page 0 was replaced by page 16.
    let _ = pf.on_demand(0, 0, 10, &mut issue);

    let stats = pf.stats();
    assert_eq!(stats.page_allocs, 18);
    assert_eq!(stats.page_hits, 0);
}

/// A page whose prefetches complete far in the future is kept over older pages.
#[test]
fn page_with_prefetches_in_flight_is_kept() {
    let mut pf = StridePrefetcher::new();
    // Leaves the page's last completion at cycle 1000.
    let _ = run(&mut pf, &[0, 4, 8, 0, 4, 8, 12], 50, 1000);
    let hits_before = pf.stats().page_hits;

    let mut issue = |_line: u64| -> u64 { 0 };
    for page in 1..=16u64 {
        let _ = pf.on_demand((page << 6) + 0x2000, 0, 10, &mut issue);
    }
    let _ = pf.on_demand(PAGE + 1, 0, 10, &mut issue);

    let stats = pf.stats();
    assert_eq!(stats.page_allocs, 17);
    assert_eq!(stats.page_hits, hits_before + 1);
}
