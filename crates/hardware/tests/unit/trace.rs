//! Access Trace Tests.
//!
//! Verifies the lines a traced core writes: thread and core columns, the
//! non-memory micro-ops since the previous data access, decimal addresses, and
//! fetch lines (including wrong-path fetches) when enabled.

use crate::common::builder::{alu, alu_block, block, load, store, store_addr};
use crate::common::mocks::ScriptedPort;
use ooosim_core::common::ConfigError;
use ooosim_core::config::{BranchPredictor, CoreConfig};
use ooosim_core::mem::{MemoryPort, PhaseClock};
use ooosim_core::trace::TraceSink;
use ooosim_core::{Config, HierarchyBuilder, OooCore};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn traced_core(sink: TraceSink, trace_ifetch: bool) -> OooCore {
    traced_core_with(sink, trace_ifetch, &CoreConfig::default())
}

fn traced_core_with(sink: TraceSink, trace_ifetch: bool, config: &CoreConfig) -> OooCore {
    let l1i: Arc<dyn MemoryPort> = Arc::new(ScriptedPort::new(1));
    let l1d: Arc<dyn MemoryPort> = Arc::new(ScriptedPort::new(2));
    OooCore::builder("core-0")
        .core_config(config)
        .l1i(l1i)
        .l1d(l1d)
        .clock(Arc::new(PhaseClock::new(10_000)))
        .trace_sink(sink)
        .trace_ifetch(trace_ifetch)
        .build()
        .unwrap()
}

/// Runs a load/store block, four ALU instructions, then a single-load block.
fn run_workload(core: &mut OooCore) {
    core.context_switch(Some(4));
    core.advance(block(0x1000, vec![load(1), store(2)]));
    core.record_load(0x100, 8);
    core.record_store(0x200, 4);
    core.advance(alu_block(0x2000, 4));
    core.advance(block(0x3000, vec![load(3)]));
    core.record_load(0x140, 8);
    core.advance(alu_block(0x4000, 4));
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

// ══════════════════════════════════════════════════════════
// 1. Core traces
// ══════════════════════════════════════════════════════════

/// Each data access becomes one line; the count spans block boundaries.
#[test]
fn data_accesses_are_traced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.txt");
    let sink = TraceSink::create(&path).unwrap();
    let mut core = traced_core(sink.clone(), false);

    run_workload(&mut core);
    sink.flush().unwrap();

    assert_eq!(
        read(&path),
        "4 0 0 L 256 8\n\
         4 0 0 S 512 4\n\
         4 0 4 L 320 8\n"
    );
}

/// Non-memory micro-ops between two accesses of one block are counted.
#[test]
fn micro_ops_between_accesses_are_counted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.txt");
    let sink = TraceSink::create(&path).unwrap();
    let mut core = traced_core(sink.clone(), false);

    core.advance(block(
        0x1000,
        vec![alu(), alu(), alu(), load(1), alu(), store_addr(1), alu(), load(2)],
    ));
    core.record_load(1000, 8);
    core.record_load(2000, 8);
    core.advance(alu_block(0x2000, 4));
    sink.flush().unwrap();

    assert_eq!(read(&path), "0 0 3 L 1000 8\n0 0 3 L 2000 8\n");
}

/// With fetch tracing on, every fetched line is traced too.
#[test]
fn fetches_are_traced_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.txt");
    let sink = TraceSink::create(&path).unwrap();
    let mut core = traced_core(sink.clone(), true);

    run_workload(&mut core);
    sink.flush().unwrap();

    assert_eq!(
        read(&path),
        "4 0 0 L 256 8\n\
         4 0 0 S 512 4\n\
         4 0 - I 8192 64\n\
         4 0 - I 12288 64\n\
         4 0 4 L 320 8\n\
         4 0 - I 16384 64\n"
    );
}

/// A mispredicted branch traces the wrong-path lines fetched before it resolves.
#[test]
fn wrong_path_fetches_are_traced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.txt");
    let sink = TraceSink::create(&path).unwrap();
    let config = CoreConfig {
        branch_predictor: BranchPredictor::Static,
        ..CoreConfig::default()
    };
    let mut core = traced_core_with(sink.clone(), true, &config);

    core.advance(block(0x1000, vec![alu().with_latency(200)]));
    core.branch_outcome(0x1000, true, 0x8000, 0x5000);
    core.advance(alu_block(0x8000, 4));
    sink.flush().unwrap();

    assert_eq!(
        read(&path),
        "0 0 - I 20480 64\n\
         0 0 - I 20544 64\n\
         0 0 - I 20608 64\n\
         0 0 - I 20672 64\n\
         0 0 - I 20736 64\n\
         0 0 - I 32768 64\n"
    );
    assert_eq!(core.stats().wrong_path_fetches, 5);
}

// ══════════════════════════════════════════════════════════
// 2. Hierarchy traces
// ══════════════════════════════════════════════════════════

/// A trace path in the configuration makes every core trace into one file.
#[test]
fn hierarchy_traces_all_cores() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.txt");
    let mut config = Config::default();
    config.sim.trace_path = Some(path.clone());
    let h = HierarchyBuilder::new(&config).cores(2).build().unwrap();

    let mut core = h.build_core(1).unwrap();
    core.advance(block(0x1000, vec![load(1)]));
    core.record_load(0x8000, 4);
    core.advance(alu_block(0x2000, 4));
    h.flush_trace().unwrap();

    assert_eq!(read(&path), "0 1 0 L 32768 4\n");
}

/// A trace file that cannot be created fails the build.
#[test]
fn unwritable_trace_path_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.sim.trace_path = Some(dir.path().join("missing").join("trace.txt"));
    let err = HierarchyBuilder::new(&config).build().unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
