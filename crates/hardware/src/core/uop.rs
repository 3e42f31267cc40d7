//! Decoded micro-op and basic-block descriptors.
//!
//! A basic block is decoded once and then replayed every time it executes, so
//! descriptors are immutable and shared behind an [`Arc`](std::sync::Arc).
//! This module defines:
//! 1. **Micro-op Kinds:** The five timing classes the core distinguishes.
//! 2. **Micro-ops:** Register operands, latency, decode cycle, and port mask.
//! 3. **Basic Blocks:** Address, size and the ordered micro-op list.
//! 4. **Branch Records:** The resolved outcome of the block-ending branch.

/// Timing class of a micro-op.
///
/// Each class has its own dispatch and completion rule in the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UopKind {
    /// Any non-memory operation; completes `lat` cycles after dispatch.
    General,
    /// Memory read. Consumes one recorded load address.
    Load,
    /// Memory write (data part). Consumes one recorded store address.
    Store,
    /// Store address generation; later loads may not dispatch before it commits.
    StoreAddr,
    /// Memory fence; orders subsequent loads behind all earlier stores.
    Fence,
}

/// A decoded micro-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Uop {
    /// Timing class.
    pub kind: UopKind,
    /// Source registers; `0` means "no source".
    pub rs: [u8; 2],
    /// Destination registers; `0` means "no destination".
    pub rd: [u8; 2],
    /// Execution latency in cycles.
    pub lat: u16,
    /// Cycle within the block's decode at which this micro-op leaves the decoder.
    pub dec_cycle: u16,
    /// Execution ports this micro-op may use, one bit per port.
    pub port_mask: u8,
    /// Additional cycles the chosen port stays busy (non-pipelined units).
    pub extra_slots: u8,
}

impl Uop {
    /// Creates a micro-op of `kind` with no operands and a one-cycle latency.
    pub const fn new(kind: UopKind, port_mask: u8) -> Self {
        Self {
            kind,
            rs: [0; 2],
            rd: [0; 2],
            lat: 1,
            dec_cycle: 0,
            port_mask,
            extra_slots: 0,
        }
    }

    /// Sets the source registers.
    #[must_use]
    pub const fn with_sources(mut self, rs0: u8, rs1: u8) -> Self {
        self.rs = [rs0, rs1];
        self
    }

    /// Sets the destination registers.
    #[must_use]
    pub const fn with_dests(mut self, rd0: u8, rd1: u8) -> Self {
        self.rd = [rd0, rd1];
        self
    }

    /// Sets the execution latency.
    #[must_use]
    pub const fn with_latency(mut self, lat: u16) -> Self {
        self.lat = lat;
        self
    }

    /// Sets the decode cycle offset.
    #[must_use]
    pub const fn with_dec_cycle(mut self, dec_cycle: u16) -> Self {
        self.dec_cycle = dec_cycle;
        self
    }

    /// Sets the number of extra port-busy cycles.
    #[must_use]
    pub const fn with_extra_slots(mut self, extra_slots: u8) -> Self {
        self.extra_slots = extra_slots;
        self
    }
}

/// A decoded basic block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicBlock {
    /// Address of the first instruction.
    pub addr: u64,
    /// Size of the block in bytes.
    pub bytes: u64,
    /// Number of architectural instructions.
    pub instrs: u32,
    /// Set when the decoder could only approximate this block.
    pub approx: bool,
    /// Micro-ops in program order.
    pub uops: Vec<Uop>,
}

impl BasicBlock {
    /// Creates an exactly decoded block.
    pub const fn new(addr: u64, bytes: u64, instrs: u32, uops: Vec<Uop>) -> Self {
        Self {
            addr,
            bytes,
            instrs,
            approx: false,
            uops,
        }
    }

    /// Marks the block as approximately decoded.
    #[must_use]
    pub const fn approximate(mut self) -> Self {
        self.approx = true;
        self
    }

    /// Number of load micro-ops.
    pub fn loads(&self) -> usize {
        self.uops.iter().filter(|u| u.kind == UopKind::Load).count()
    }

    /// Number of store micro-ops.
    pub fn stores(&self) -> usize {
        self.uops.iter().filter(|u| u.kind == UopKind::Store).count()
    }
}

/// Outcome of the conditional branch that ends a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BranchRecord {
    /// Address of the branch instruction.
    pub pc: u64,
    /// Resolved direction.
    pub taken: bool,
    /// Next PC if taken.
    pub taken_npc: u64,
    /// Next PC if not taken.
    pub not_taken_npc: u64,
}

impl BranchRecord {
    /// Address the front end would have fetched had it guessed the other way.
    #[inline]
    pub const fn wrong_path_addr(&self) -> u64 {
        if self.taken {
            self.not_taken_npc
        } else {
            self.taken_npc
        }
    }
}
