//! Memory-side timing collaborators.
//!
//! Every level below the core answers one question: given a request for a line at
//! some cycle, when does it complete? This module provides:
//! 1. **Requests:** [`MemReq`] travelling towards memory and [`InvReq`] travelling back.
//! 2. **Interfaces:** [`MemObject`] for the request path, [`Invalidate`] for the
//!    invalidation path, and [`MemoryPort`] for the core-facing first level.
//! 3. **Levels:** Core filter caches, a shared timing cache, and memory channels.
//! 4. **Phase Clock:** The global phase counter shared by cores and channels.
//!
//! All levels are shared between cores behind [`Arc`], so they take `&self` and keep
//! their mutable state behind internal locks or atomics.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::common::{LineState, ReqFlags, ReqType};

/// Shared set-associative timing cache.
pub mod cache;

/// Fixed-latency and queueing memory channels.
pub mod controller;

/// Core-private direct-mapped first level.
pub mod filter;

/// Global phase counter.
pub mod phase;

pub use cache::TimingCache;
pub use controller::{Md1Memory, SimpleMemory};
pub use filter::FilterCache;
pub use phase::PhaseClock;

/// A request for one line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemReq {
    /// Line address (byte address shifted right by the line bits).
    pub line_addr: u64,
    /// Request kind.
    pub req_type: ReqType,
    /// Cycle the request is issued.
    pub cycle: u64,
    /// Request flags.
    pub flags: ReqFlags,
    /// Core that originated the request.
    pub core_id: u32,
    /// Permission granted by the level that served the request.
    pub state: LineState,
}

impl MemReq {
    /// Creates a request with no flags from core 0.
    pub const fn new(line_addr: u64, req_type: ReqType, cycle: u64) -> Self {
        Self {
            line_addr,
            req_type,
            cycle,
            flags: ReqFlags::NONE,
            core_id: 0,
            state: LineState::Invalid,
        }
    }

    /// Adds flags to the request.
    #[must_use]
    pub const fn with_flags(mut self, flags: ReqFlags) -> Self {
        self.flags = self.flags.union(flags);
        self
    }

    /// Sets the originating core.
    #[must_use]
    pub const fn with_core(mut self, core_id: u32) -> Self {
        self.core_id = core_id;
        self
    }

    /// Returns `true` if every bit of `flag` is set.
    #[inline]
    pub const fn is(&self, flag: ReqFlags) -> bool {
        self.flags.contains(flag)
    }

    /// State a serving level grants for this request.
    ///
    /// Reads get an exclusive copy unless the requester cannot take one, exclusive
    /// reads get a modified copy, and write-backs leave the requester with nothing.
    pub const fn granted_state(&self) -> LineState {
        match self.req_type {
            ReqType::Gets if self.flags.contains(ReqFlags::NO_EXCL) => LineState::Shared,
            ReqType::Gets => LineState::Exclusive,
            ReqType::Getx => LineState::Modified,
            ReqType::Puts | ReqType::Putx => LineState::Invalid,
        }
    }
}

/// An invalidation travelling from a level towards the cores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvReq {
    /// Line being invalidated.
    pub line_addr: u64,
    /// Cycle the invalidation is sent.
    pub cycle: u64,
}

/// A level on the request path.
pub trait MemObject: Send + Sync {
    /// Serves `req`, sets `req.state`, and returns the completion cycle.
    ///
    /// The returned cycle is never earlier than `req.cycle`.
    fn access(&self, req: &mut MemReq) -> u64;

    /// Name used in statistics.
    fn name(&self) -> &str;
}

/// A holder of lines that can be told to drop one.
pub trait Invalidate: Send + Sync {
    /// Drops `req.line_addr` and returns the cycle the invalidation completes.
    fn invalidate(&self, req: &InvReq) -> u64;
}

/// Core-facing first level: byte-addressed loads and stores.
pub trait MemoryPort: Send + Sync {
    /// Returns the cycle the load of `addr` issued at `cycle` completes.
    ///
    /// # Arguments
    ///
    /// * `addr` - Byte address.
    /// * `cycle` - Issue cycle.
    /// * `instrs` - Instructions retired by the core so far.
    fn load(&self, addr: u64, cycle: u64, instrs: u64) -> u64;

    /// Returns the cycle the store to `addr` issued at `cycle` completes.
    fn store(&self, addr: u64, cycle: u64, instrs: u64) -> u64;

    /// Drops all lines held for the previous software context.
    fn context_switch(&self);

    /// log2 of the line size in bytes.
    fn line_bits(&self) -> u32;
}

/// Weak edges from a level to the holders below it.
#[derive(Debug, Default)]
pub struct Children {
    edges: RwLock<Vec<Weak<dyn Invalidate>>>,
}

impl Children {
    /// Creates an empty edge set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a child.
    pub fn attach(&self, child: Weak<dyn Invalidate>) {
        self.edges
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(child);
    }

    /// Number of attached children, live or not.
    pub fn len(&self) -> usize {
        self.edges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no child was ever attached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forwards `req` to every live child and returns the latest completion cycle.
    pub fn invalidate_all(&self, req: &InvReq) -> u64 {
        let live: Vec<Arc<dyn Invalidate>> = self
            .edges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        live.iter()
            .map(|child| child.invalidate(req))
            .fold(req.cycle, u64::max)
    }
}
