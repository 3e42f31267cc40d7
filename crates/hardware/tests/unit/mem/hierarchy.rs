//! Hierarchy Tests.
//!
//! Verifies that the hierarchy is wired from configuration as expected: one pair
//! of filter caches per core, an optional shared cache and prefetcher, inclusion
//! through invalidation edges, and multi-core runs synchronized by phases.

use crate::common::builder::{alu, block, load};
use crate::common::init_logging;
use ooosim_core::common::ConfigError;
use ooosim_core::config::{MemoryController, Prefetcher};
use ooosim_core::core::BasicBlock;
use ooosim_core::mem::MemoryPort;
use ooosim_core::{Config, HierarchyBuilder, OooCore};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Barrier};

fn simple_config() -> Config {
    let mut config = Config::default();
    config.memory.controller = MemoryController::Simple;
    config.memory.latency = 100;
    config
}

/// Seven ALU micro-ops and one load.
fn loop_block() -> Arc<BasicBlock> {
    let mut uops = vec![alu(); 7];
    uops.push(load(9));
    block(0x1000, uops)
}

/// Runs `core` until it needs a barrier, one load of a fresh line per block.
fn run_phase(core: &mut OooCore, bbl: &Arc<BasicBlock>, base: u64, n: &mut u64) {
    while !core.needs_barrier() {
        core.advance(Arc::clone(bbl));
        core.record_load(base + *n * 64, 8);
        *n += 1;
    }
}

// ══════════════════════════════════════════════════════════
// 1. Construction
// ══════════════════════════════════════════════════════════

/// Every core gets an instruction and a data cache in front of one shared level.
#[test]
fn two_cores_share_one_level() {
    let h = HierarchyBuilder::new(&Config::default())
        .cores(2)
        .build()
        .unwrap();
    let c0 = h.build_core(0).unwrap();
    let c1 = h.build_core(1).unwrap();
    let stats = h.stats(&[&c0, &c1]);

    let names: Vec<&str> = stats.caches.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["l1i-0", "l1d-0", "l1i-1", "l1d-1", "l2"]);
    assert_eq!(stats.cores.len(), 2);
    assert_eq!(stats.channel.name, "mem");
    assert!(stats.prefetch.is_none());
}

/// Cores beyond the built port count are rejected.
#[test]
fn core_without_ports_is_rejected() {
    let h = HierarchyBuilder::new(&Config::default())
        .cores(2)
        .build()
        .unwrap();
    let err = h.build_core(5).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "cores", .. }));
}

/// A hierarchy without cores or with an invalid configuration is not built.
#[test]
fn invalid_setups_are_rejected() {
    let err = HierarchyBuilder::new(&Config::default())
        .cores(0)
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "cores", .. }));

    let mut config = Config::default();
    config.core.rob_entries = 0;
    let err = HierarchyBuilder::new(&config).build().unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            field: "core.rob_entries",
            ..
        }
    ));
}

/// The configured prefetcher sits on the data path.
#[test]
fn prefetcher_is_reported() {
    let mut config = simple_config();
    config.cache.l2.prefetcher = Prefetcher::Stride;
    let h = HierarchyBuilder::new(&config).build().unwrap();
    let core = h.build_core(0).unwrap();
    let stats = h.stats(&[&core]);
    assert_eq!(stats.prefetch.map(|p| p.name), Some("pf-stride".to_owned()));
}

// ══════════════════════════════════════════════════════════
// 2. Request path
// ══════════════════════════════════════════════════════════

/// A first-level miss pays the shared level and the channel.
#[test]
fn miss_latency_adds_up_along_the_path() {
    let h = HierarchyBuilder::new(&simple_config()).build().unwrap();
    let l1d = &h.ports()[0].l1d;
    assert_eq!(l1d.load(0x1000, 0, 0), 110);
    // Shared-level hit after the first-level line is dropped.
    l1d.context_switch();
    assert_eq!(l1d.load(0x1000, 200, 0), 210);
    // First-level hit.
    assert_eq!(l1d.load(0x1008, 300, 0), 300);
}

/// Without a shared level, misses go straight to the channel.
#[test]
fn disabled_shared_level_goes_to_channel() {
    let mut config = simple_config();
    config.cache.l2.enabled = false;
    let h = HierarchyBuilder::new(&config).build().unwrap();
    assert!(h.l2().is_none());
    assert_eq!(h.ports()[0].l1d.load(0x1000, 0, 0), 100);

    let core = h.build_core(0).unwrap();
    assert_eq!(h.stats(&[&core]).caches.len(), 2);
}

/// Evicting a line from the shared level drops it from the core's data cache.
#[test]
fn shared_eviction_invalidates_core_cache() {
    let mut config = simple_config();
    // One set of two ways.
    config.cache.l2.size_bytes = 128;
    config.cache.l2.ways = 2;
    let h = HierarchyBuilder::new(&config).build().unwrap();
    let l1d = &h.ports()[0].l1d;

    let _ = l1d.load(0, 0, 0);
    let _ = l1d.load(64, 0, 0);
    let _ = l1d.load(128, 0, 0);
    assert_eq!(l1d.stats().invalidations, 1);

    let _ = l1d.load(0, 1000, 0);
    assert_eq!(l1d.stats().misses, 4);
}

// ══════════════════════════════════════════════════════════
// 3. Multi-core phases
// ══════════════════════════════════════════════════════════

/// Cores stepped phase by phase on one thread all end up past the last phase.
#[test]
fn lockstep_phases_on_one_thread() {
    init_logging();
    let mut config = Config::default();
    config.sim.phase_length = 1000;
    config.sim.min_update_cycles = 1000;
    let h = HierarchyBuilder::new(&config).cores(2).build().unwrap();
    let mut cores: Vec<OooCore> = (0..2).map(|id| h.build_core(id).unwrap()).collect();
    let bbl = loop_block();
    let mut counts = [0u64; 2];

    for _ in 0..3 {
        for (id, core) in cores.iter_mut().enumerate() {
            run_phase(core, &bbl, 0x10_0000 * (id as u64 + 1), &mut counts[id]);
        }
        let _ = h.clock().advance_phase();
        for core in &mut cores {
            core.take_barrier();
        }
    }

    assert_eq!(h.clock().num_phases(), 3);
    let refs: Vec<&OooCore> = cores.iter().collect();
    let stats = h.stats(&refs);
    for (core, blocks) in stats.cores.iter().zip(counts) {
        assert!(core.cycles > 3000);
        // The last block advanced is still buffered.
        assert_eq!(core.bbls, blocks - 1);
    }
    assert!(stats.channel.reads > 0);
    assert!(stats.channel.latency_updates >= 2);
}

/// One thread per core, meeting at a barrier at the end of every phase.
#[test]
fn threaded_cores_meet_at_phase_barriers() {
    let mut config = Config::default();
    config.sim.phase_length = 1000;
    let h = HierarchyBuilder::new(&config).cores(2).build().unwrap();
    let barrier = Barrier::new(2);
    let bbl = loop_block();

    let instrs: Vec<u64> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..2u32)
            .map(|id| {
                let mut core = h.build_core(id).unwrap();
                let (h, barrier, bbl) = (&h, &barrier, &bbl);
                s.spawn(move || {
                    let mut n = 0;
                    for _ in 0..4 {
                        run_phase(&mut core, bbl, 0x10_0000 * u64::from(id + 1), &mut n);
                        if barrier.wait().is_leader() {
                            let _ = h.clock().advance_phase();
                        }
                        let _ = barrier.wait();
                        core.take_barrier();
                    }
                    core.instrs()
                })
            })
            .collect();
        handles.into_iter().map(|t| t.join().unwrap()).collect()
    });

    assert_eq!(h.clock().num_phases(), 4);
    assert!(instrs.iter().all(|&n| n > 0));
}
