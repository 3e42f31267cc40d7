//! Global Timing Constants.
//!
//! This module defines constants used across the model. It includes:
//! 1. **Stage Offsets:** Fixed positions of fetch, decode, issue and dispatch in the pipe.
//! 2. **Fixed Latencies:** Load-to-use delay of the first-level data cache.
//! 3. **Sentinels:** Values marking empty forwarding entries and unknown addresses.

/// Cycle at which a fetched block enters the pipe.
pub const FETCH_STAGE: u64 = 1;

/// Cycle offset of the decode stage; the decode cycle starts here.
pub const DECODE_STAGE: u64 = 4;

/// Cycle offset of the issue stage.
pub const ISSUE_STAGE: u64 = 7;

/// Cycle offset of the dispatch stage.
pub const DISPATCH_STAGE: u64 = 13;

/// Cycles between the end of fetch and the start of decode of the next block.
pub const FETCH_TO_DECODE: u64 = DECODE_STAGE - FETCH_STAGE;

/// Minimum cycles between issue and dispatch of any micro-op.
pub const ISSUE_TO_DISPATCH: u64 = DISPATCH_STAGE - ISSUE_STAGE;

/// Load-to-use latency added on top of the data cache response.
pub const L1D_LAT: u64 = 4;

/// Number of register scoreboard entries; micro-op register fields are 8-bit.
pub const MAX_REGISTERS: usize = 256;

/// Register index that is never a real dependency; always ready at the current cycle.
pub const ZERO_REG: u8 = 0;

/// Address marking an empty forwarding-table entry.
pub const NO_ADDR: u64 = u64::MAX;

/// Bits of a line address that select the position within a prefetch page.
pub const PAGE_LINE_BITS: u32 = 6;

/// Lines per prefetch page.
pub const LINES_PER_PAGE: usize = 1 << PAGE_LINE_BITS;
