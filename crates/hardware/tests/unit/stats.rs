//! Statistics Tests.
//!
//! Verifies derived rates and section-selectable report output.

use ooosim_core::stats::{
    CacheStats, ChannelStats, CoreStats, PrefetchStats, STATS_SECTIONS, SimStats,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn sample() -> SimStats {
    let mut stats = SimStats::default();
    stats.cores.push(CoreStats {
        name: "core-0".into(),
        cycles: 2000,
        unhalted_cycles: 1000,
        instrs: 1500,
        branches: 10,
        mispred_branches: 1,
        mem_accesses: 4,
        mem_access_cycles: 30,
        ..CoreStats::default()
    });
    stats.cores.push(CoreStats {
        name: "core-1".into(),
        cycles: 3000,
        unhalted_cycles: 3000,
        instrs: 500,
        ..CoreStats::default()
    });
    stats.caches.push(CacheStats {
        name: "l2".into(),
        hits: 3,
        misses: 1,
        ..CacheStats::default()
    });
    stats.prefetch = Some(PrefetchStats {
        name: "pf-stride".into(),
        prefetches: 7,
        ..PrefetchStats::default()
    });
    stats.channel = ChannelStats {
        name: "mem".into(),
        reads: 4,
        total_read_latency: 500,
        latency_updates: 2,
        load_histogram_sum: 30,
        current_latency: 120,
        ..ChannelStats::default()
    };
    stats
}

fn render(stats: &SimStats, sections: &[&str]) -> String {
    let sections: Vec<String> = sections.iter().map(|s| (*s).to_owned()).collect();
    let mut out = String::new();
    stats.write_sections(&mut out, &sections).unwrap();
    out
}

/// Last column of the report line starting with `key`.
fn value<'a>(out: &'a str, key: &str) -> Option<&'a str> {
    out.lines()
        .map(str::trim)
        .find(|line| line.split_whitespace().next() == Some(key))
        .and_then(|line| line.split_whitespace().last())
}

// ══════════════════════════════════════════════════════════
// 1. Derived values
// ══════════════════════════════════════════════════════════

/// Rates are computed from the raw counters and are zero when undefined.
#[test]
fn derived_rates() {
    let stats = sample();
    assert!((stats.cores[0].ipc() - 1.5).abs() < 1e-9);
    assert!((stats.caches[0].miss_rate() - 25.0).abs() < 1e-9);
    assert!((stats.channel.avg_read_latency() - 125.0).abs() < 1e-9);
    assert!((stats.channel.avg_load() - 15.0).abs() < 1e-9);
    assert_eq!(stats.total_instrs(), 2000);
    assert!((stats.cores[0].avg_access_latency() - 7.5).abs() < 1e-9);

    assert!(CoreStats::default().ipc().abs() < f64::EPSILON);
    assert!(CoreStats::default().avg_access_latency().abs() < f64::EPSILON);
    assert!(CacheStats::default().miss_rate().abs() < f64::EPSILON);
    assert!(ChannelStats::default().avg_load().abs() < f64::EPSILON);
}

// ══════════════════════════════════════════════════════════
// 2. Report sections
// ══════════════════════════════════════════════════════════

/// An empty selection prints every section.
#[test]
fn empty_selection_prints_everything() {
    let out = render(&sample(), &[]);
    for header in [
        "OUT-OF-ORDER TIMING MODEL STATISTICS",
        "CORE BREAKDOWN",
        "BRANCH PREDICTION",
        "CACHES",
        "PREFETCHER (pf-stride)",
        "MEMORY CHANNEL (mem)",
    ] {
        assert!(out.contains(header), "missing {header}");
    }
    assert_eq!(value(&out, "sim_cycles"), Some("3000"));
    assert_eq!(value(&out, "sim_insts"), Some("2000"));
    assert_eq!(value(&out, "pf.issued"), Some("7"));
}

/// Each named section prints alone.
#[rstest]
#[case::summary("summary", "sim_insts")]
#[case::core("core", "CORE BREAKDOWN")]
#[case::branch("branch", "accuracy: 90.00%")]
#[case::cache("cache", "miss_rate: 25.00%")]
#[case::prefetch("prefetch", "pf.issued")]
#[case::memory("memory", "mem.avg_read_latency")]
fn single_section(#[case] section: &str, #[case] needle: &str) {
    let out = render(&sample(), &[section]);
    assert!(out.contains(needle), "{section}: {out}");
    if section != "memory" {
        assert!(!out.contains("MEMORY CHANNEL"));
    }
    if section != "core" {
        assert!(!out.contains("CORE BREAKDOWN"));
    }
}

/// Without a prefetcher the prefetch section is empty.
#[test]
fn prefetch_section_needs_prefetcher() {
    let mut stats = sample();
    stats.prefetch = None;
    let out = render(&stats, &["prefetch"]);
    assert!(!out.contains("PREFETCHER"));
}

/// Every section name is recognized.
#[test]
fn section_names_are_known() {
    assert_eq!(
        STATS_SECTIONS,
        &["summary", "core", "branch", "cache", "prefetch", "memory"]
    );
}

/// Channel lines carry the derived averages.
#[test]
fn memory_section_values() {
    let out = render(&sample(), &["memory"]);
    assert_eq!(value(&out, "mem.avg_read_latency"), Some("125.00"));
    assert_eq!(value(&out, "mem.avg_load"), Some("15.00%"));
    assert_eq!(value(&out, "mem.latency"), Some("120"));
}

/// The core breakdown reports memory access totals per core.
#[test]
fn core_section_reports_access_latency() {
    let out = render(&sample(), &["core"]);
    assert!(out.contains("mem.accesses: 4 | mem.avg_latency: 7.50"), "{out}");
    assert!(out.contains("mem.accesses: 0 | mem.avg_latency: 0.00"), "{out}");
}
