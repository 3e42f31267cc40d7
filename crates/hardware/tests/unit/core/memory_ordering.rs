//! Memory Ordering Tests.
//!
//! Verifies store-to-load forwarding, ordering of loads behind store addresses
//! and fences, predicated-off memory operations, and the contract between
//! recorded addresses and the block's memory micro-ops.

use crate::common::builder::{CoreRigBuilder, MEM_PORTS, alu_block, block, load, store, store_addr};
use crate::common::mocks::PortCall;
use ooosim_core::core::{Uop, UopKind};
use pretty_assertions::assert_eq;
use std::panic::{self, AssertUnwindSafe};

// ══════════════════════════════════════════════════════════
// 1. Store-to-load forwarding
// ══════════════════════════════════════════════════════════

/// A load to the address of a slow earlier store completes with the store.
#[test]
fn load_waits_for_matching_store() {
    let mut rig = CoreRigBuilder::new().data_latencies(2, 50).build();
    rig.core.advance(block(0x1000, vec![store(0), load(5)]));
    rig.core.record_store(0x100, 8);
    rig.core.record_load(0x100, 8);
    rig.core.advance(alu_block(0x2000, 1));

    let t = rig.core.last_block_timings();
    assert_eq!(t[1].commit_cycle, t[0].commit_cycle);
}

/// A store to another address sharing the forwarding slot does not delay the load.
#[test]
fn aliasing_store_does_not_forward() {
    let mut rig = CoreRigBuilder::new().data_latencies(2, 50).build();
    rig.core.advance(block(0x1000, vec![store(0), load(5)]));
    // Both addresses map to slot 0 of a 32-entry table.
    rig.core.record_store(0x100, 8);
    rig.core.record_load(0x200, 8);
    rig.core.advance(alu_block(0x2000, 1));

    let t = rig.core.last_block_timings();
    assert!(t[1].commit_cycle < t[0].commit_cycle);
}

// ══════════════════════════════════════════════════════════
// 2. Ordering behind store addresses and fences
// ══════════════════════════════════════════════════════════

/// A load dispatches only after every earlier store address has committed.
#[test]
fn load_waits_for_store_address() {
    let mut rig = CoreRigBuilder::new().build();
    rig.core.advance(block(0x1000, vec![store_addr(40), load(5)]));
    rig.core.record_load(0x300, 8);
    rig.core.advance(alu_block(0x2000, 1));

    let t = rig.core.last_block_timings();
    assert_eq!(t[0].kind, UopKind::StoreAddr);
    assert!(t[1].dispatch_cycle > t[0].commit_cycle);
    assert_eq!(
        rig.l1d.calls(),
        vec![PortCall::Load {
            addr: 0x300,
            cycle: t[1].dispatch_cycle
        }]
    );
}

/// The store-address watermark carries over into the next block.
#[test]
fn store_address_orders_loads_of_next_block() {
    let mut rig = CoreRigBuilder::new().build();
    rig.core.advance(block(0x1000, vec![store_addr(40)]));
    rig.core.advance(block(0x2000, vec![load(5)]));
    let sa_commit = rig.core.last_block_timings()[0].commit_cycle;
    rig.core.record_load(0x300, 8);
    rig.core.advance(alu_block(0x3000, 1));

    assert!(rig.core.last_block_timings()[0].dispatch_cycle > sa_commit);
}

/// A fence orders later loads behind the completion of earlier stores.
#[test]
fn fence_orders_loads_behind_stores() {
    let mut rig = CoreRigBuilder::new().data_latencies(2, 30).build();
    let fence = Uop::new(UopKind::Fence, MEM_PORTS);
    rig.core.advance(block(0x1000, vec![store(0), fence, load(5)]));
    rig.core.record_store(0x100, 8);
    rig.core.record_load(0x400, 8);
    rig.core.advance(alu_block(0x2000, 1));

    let t = rig.core.last_block_timings();
    assert!(t[2].dispatch_cycle > t[0].commit_cycle);
}

// ══════════════════════════════════════════════════════════
// 3. Predicated-off operations
// ══════════════════════════════════════════════════════════

/// A predicated-off load takes a load slot but never reaches the data port.
#[test]
fn predicated_off_load_skips_memory() {
    let mut rig = CoreRigBuilder::new().build();
    rig.core.advance(block(0x1000, vec![load(5), load(6)]));
    rig.core.record_pred_false_mem_op();
    rig.core.record_load(0x500, 8);
    rig.core.advance(alu_block(0x2000, 1));

    let t = rig.core.last_block_timings();
    assert_eq!(t[0].commit_cycle, t[0].dispatch_cycle);
    assert_eq!(rig.l1d.loads(), 1);
    assert_eq!(rig.core.stats().pred_false_mem_ops, 1);
}

// ══════════════════════════════════════════════════════════
// 4. Recorded address contract
// ══════════════════════════════════════════════════════════

/// A load micro-op without a recorded address is a caller bug.
#[test]
#[should_panic(expected = "load micro-ops and recorded loads out of sync")]
fn missing_load_address_panics() {
    let mut rig = CoreRigBuilder::new().build();
    rig.core.advance(block(0x1000, vec![load(5)]));
    rig.core.advance(alu_block(0x2000, 1));
}

/// Recording more stores than the block has store micro-ops is a caller bug.
#[test]
#[should_panic(expected = "store micro-ops and recorded stores out of sync")]
fn extra_store_address_panics() {
    let mut rig = CoreRigBuilder::new().build();
    rig.core.advance(block(0x1000, vec![store(0)]));
    rig.core.record_store(0x100, 8);
    rig.core.record_store(0x108, 8);
    rig.core.advance(alu_block(0x2000, 1));
}

/// A mismatch is caught before any micro-op of the block reaches memory.
#[test]
fn mismatch_is_caught_before_the_block_runs() {
    let mut rig = CoreRigBuilder::new().build();
    rig.core.advance(block(0x1000, vec![load(5), store(5)]));
    rig.core.record_load(0x100, 8);

    let core = &mut rig.core;
    let res = panic::catch_unwind(AssertUnwindSafe(|| core.advance(alu_block(0x2000, 1))));
    assert!(res.is_err());
    assert!(rig.l1d.calls().is_empty());
}
