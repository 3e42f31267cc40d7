//! Timing Invariant Properties.
//!
//! Randomized blocks of mixed micro-ops must always produce ordered timings:
//! dispatch never precedes issue, commit never precedes dispatch, loads never
//! pass an earlier store address, and the core clock never runs backwards.

use crate::common::builder::{ALU_PORTS, CoreRig, CoreRigBuilder, MEM_PORTS, alu_block, block};
use ooosim_core::core::pipeline::{ReorderBuffer, ResourceTracker};
use ooosim_core::core::{BasicBlock, Uop, UopKind};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

fn uop_strategy() -> impl Strategy<Value = Uop> {
    let kind = prop_oneof![
        4 => Just(UopKind::General),
        2 => Just(UopKind::Load),
        1 => Just(UopKind::Store),
        1 => Just(UopKind::StoreAddr),
    ];
    (kind, 1u16..20, 0u8..8, 0u8..8, 0u8..8, 0u16..3).prop_map(
        |(kind, lat, rs0, rs1, rd, dec)| {
            let ports = if kind == UopKind::General { ALU_PORTS } else { MEM_PORTS };
            Uop::new(kind, ports)
                .with_latency(lat)
                .with_sources(rs0, rs1)
                .with_dests(rd, 0)
                .with_dec_cycle(dec)
        },
    )
}

fn blocks_strategy() -> impl Strategy<Value = Vec<Vec<Uop>>> {
    prop::collection::vec(prop::collection::vec(uop_strategy(), 1..24), 1..6)
}

fn record_accesses(rig: &mut CoreRig, bbl: &BasicBlock, salt: u64) {
    for (i, uop) in bbl.uops.iter().enumerate() {
        let addr = 0x1_0000 + ((salt * 31 + i as u64) % 16) * 8;
        match uop.kind {
            UopKind::Load => rig.core.record_load(addr, 8),
            UopKind::Store => rig.core.record_store(addr, 8),
            _ => {}
        }
    }
}

fn check_block(rig: &CoreRig) -> Result<(), TestCaseError> {
    let mut last_store_addr_commit = None;
    for t in rig.core.last_block_timings() {
        prop_assert!(t.dispatch_cycle >= t.issue_cycle, "{t:?}");
        prop_assert!(t.commit_cycle >= t.dispatch_cycle, "{t:?}");
        match t.kind {
            UopKind::StoreAddr => {
                last_store_addr_commit = last_store_addr_commit.max(Some(t.commit_cycle));
            }
            UopKind::Load => {
                if let Some(sa) = last_store_addr_commit {
                    prop_assert!(t.dispatch_cycle > sa, "load {t:?} passed store address at {sa}");
                }
            }
            _ => {}
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every simulated block yields ordered per-micro-op cycles.
    #[test]
    fn timings_are_ordered(blocks in blocks_strategy()) {
        let mut rig = CoreRigBuilder::new().data_latencies(3, 9).build();
        let mut last_cur = 0;
        let mut total_instrs = 0;
        for (i, uops) in blocks.into_iter().enumerate() {
            let bbl = block(0x4000 + 0x100 * i as u64, uops);
            rig.core.advance(Arc::clone(&bbl));
            check_block(&rig)?;
            prop_assert!(rig.core.cur_cycle() >= last_cur);
            last_cur = rig.core.cur_cycle();
            record_accesses(&mut rig, &bbl, i as u64);
            total_instrs += u64::from(bbl.instrs);
        }
        rig.core.advance(alu_block(0x9000, 1));
        check_block(&rig)?;
        prop_assert!(rig.core.cur_cycle() >= last_cur);
        prop_assert_eq!(rig.core.instrs(), total_instrs);
    }

    /// Retirement is in order and never exceeds the retire width in one cycle.
    #[test]
    fn reorder_buffer_retires_in_order(
        width in 1u32..5,
        cycles in prop::collection::vec(0u64..200, 1..100),
    ) {
        let mut rob = ReorderBuffer::new(16, width);
        let mut per_cycle: HashMap<u64, u32> = HashMap::new();
        let mut last = 0;
        for c in cycles {
            rob.mark_retire(c);
            let retired = rob.last_retire_cycle();
            prop_assert!(retired >= c);
            prop_assert!(retired >= last);
            last = retired;
            let count = per_cycle.entry(retired).or_default();
            *count += 1;
            prop_assert!(*count <= width);
        }
    }
}
