//! Phase and Context Tests.
//!
//! Verifies phase barriers, leaving and rejoining synchronized execution,
//! contention windows, and context switches.

use crate::common::builder::{CoreRigBuilder, alu_block};
use crate::common::init_logging;
use crate::common::mocks::MockPort;
use ooosim_core::OooCore;
use ooosim_core::mem::{MemoryPort, PhaseClock};
use pretty_assertions::assert_eq;
use std::sync::Arc;

// ══════════════════════════════════════════════════════════
// 1. Phase barriers
// ══════════════════════════════════════════════════════════

/// A core asks for a barrier once it runs past its phase and stops asking after
/// the barrier moves the phase end.
#[test]
fn barrier_needed_after_phase_end() {
    let mut rig = CoreRigBuilder::new().phase_length(100).build();
    assert!(!rig.core.needs_barrier());

    let mut blocks = 0;
    while !rig.core.needs_barrier() && blocks < 10_000 {
        rig.core.advance(alu_block(0x1000, 8));
        blocks += 1;
    }
    assert!(rig.core.needs_barrier(), "core never reached its phase end");
    assert!(rig.core.cur_cycle() > 100);

    let _ = rig.clock.advance_phase();
    rig.core.take_barrier();
    assert!(!rig.core.needs_barrier());
}

// ══════════════════════════════════════════════════════════
// 2. Leave and join
// ══════════════════════════════════════════════════════════

/// A core that left skips ahead to the global phase when it rejoins, and the
/// skipped cycles do not count as unhalted.
#[test]
fn join_after_leave_skips_to_global_phase() {
    init_logging();
    let mut rig = CoreRigBuilder::new().phase_length(1000).build();
    rig.core.leave();
    for _ in 0..3 {
        let _ = rig.clock.advance_phase();
    }
    rig.core.join();

    assert_eq!(rig.core.cur_cycle(), 3000);
    assert_eq!(rig.core.stats().unhalted_cycles, 0);
    assert!(!rig.core.needs_barrier());

    rig.core.advance(alu_block(0x1000, 8));
    rig.core.advance(alu_block(0x1020, 8));
    let stats = rig.core.stats();
    assert_eq!(stats.unhalted_cycles, rig.core.cur_cycle() - 3000);
}

/// A running core that joins keeps its own cycle.
#[test]
fn join_while_running_keeps_cycle() {
    let mut rig = CoreRigBuilder::new().phase_length(1000).build();
    let _ = rig.clock.advance_phase();
    rig.core.join();
    assert_eq!(rig.core.cur_cycle(), 0);
}

// ══════════════════════════════════════════════════════════
// 3. Contention windows
// ══════════════════════════════════════════════════════════

/// Queued contention delay is applied once, when the window closes.
#[test]
fn contention_applied_at_window_end() {
    let mut rig = CoreRigBuilder::new().build();
    rig.core.add_contention(25);
    rig.core.cs_start();
    assert_eq!(rig.core.cur_cycle(), 0);
    rig.core.cs_end();
    assert_eq!(rig.core.cur_cycle(), 25);
    rig.core.cs_end();
    assert_eq!(rig.core.cur_cycle(), 25);
    assert_eq!(rig.core.stats().contention_cycles, 25);
}

/// Queued contention delay is also applied when the core rejoins.
#[test]
fn contention_applied_at_join() {
    let mut rig = CoreRigBuilder::new().build();
    rig.core.add_contention(10);
    rig.core.join();
    assert_eq!(rig.core.cur_cycle(), 10);
}

// ══════════════════════════════════════════════════════════
// 4. Context switches
// ══════════════════════════════════════════════════════════

/// Switching out flushes both ports and drops the buffered block, so the next
/// block is only buffered again.
#[test]
fn switch_out_flushes_ports_and_buffer() {
    let mut l1i = MockPort::new();
    let _ = l1i.expect_line_bits().return_const(6u32);
    let _ = l1i.expect_context_switch().times(1).return_const(());
    let mut l1d = MockPort::new();
    let _ = l1d.expect_context_switch().times(1).return_const(());
    // No load or store expectations: any access would fail the test.

    let l1i: Arc<dyn MemoryPort> = Arc::new(l1i);
    let l1d: Arc<dyn MemoryPort> = Arc::new(l1d);
    let mut core = OooCore::builder("core-0")
        .l1i(l1i)
        .l1d(l1d)
        .clock(Arc::new(PhaseClock::new(1000)))
        .build()
        .unwrap();

    core.advance(alu_block(0x1000, 4));
    core.context_switch(None);
    core.advance(alu_block(0x2000, 4));
    assert_eq!(core.bbls(), 0);
}

/// Switching in only renames the running context.
#[test]
fn switch_in_keeps_timing_state() {
    let mut rig = CoreRigBuilder::new().build();
    rig.core.advance(alu_block(0x1000, 4));
    rig.core.context_switch(Some(3));
    rig.core.advance(alu_block(0x2000, 4));
    assert_eq!(rig.core.bbls(), 1);
    assert_eq!(rig.l1i.context_switches(), 0);
    assert_eq!(rig.l1d.context_switches(), 0);
}
