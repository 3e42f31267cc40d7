//! Hardware prefetch engine.
//!
//! The engine sits between the core-private caches and the shared level. Demand
//! reads pass through it to the parent; after each one the configured policy may
//! issue prefetches for nearby lines of the same page. It provides:
//! 1. **Policy Interface:** [`Prefetcher`], fed one demand read at a time.
//! 2. **Engine:** [`PrefetchEngine`], which owns a policy behind a lock and forwards
//!    requests and invalidations.
//! 3. **Policies:** A per-page stride detector and an access-map pattern matcher.

/// Access map pattern matching prefetcher.
pub mod ampm;

/// Per-page stride prefetcher with confidence counters.
pub mod stride;

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::trace;

pub use self::ampm::AmpmPrefetcher;
pub use self::stride::StridePrefetcher;
use crate::common::{ReqFlags, ReqType};
use crate::mem::{Children, InvReq, Invalidate, MemObject, MemReq};
use crate::stats::PrefetchStats;

/// A prefetch policy.
///
/// Policies never talk to memory directly; they call `issue` with the line to
/// prefetch and get back the cycle that prefetch completes.
pub trait Prefetcher: Send {
    /// Observes a demand read and issues prefetches.
    ///
    /// # Arguments
    ///
    /// * `line_addr` - Line read by the demand access.
    /// * `req_cycle` - Cycle the demand read was issued; prefetches issue at the same cycle.
    /// * `resp_cycle` - Cycle the parent completed the demand read.
    /// * `issue` - Sends a prefetch for a line and returns its completion cycle.
    ///
    /// # Returns
    ///
    /// Completion cycle of the demand read, which may be later than `resp_cycle`
    /// when it hits a prefetch still in flight.
    fn on_demand(
        &mut self,
        line_addr: u64,
        req_cycle: u64,
        resp_cycle: u64,
        issue: &mut dyn FnMut(u64) -> u64,
    ) -> u64;

    /// Event counters.
    fn stats(&self) -> PrefetchStats;
}

/// Prefetch level wrapping a policy.
pub struct PrefetchEngine<P: Prefetcher> {
    name: String,
    policy: Mutex<P>,
    parent: Arc<dyn MemObject>,
    children: Children,
}

impl<P: Prefetcher> std::fmt::Debug for PrefetchEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefetchEngine")
            .field("name", &self.name)
            .field("parent", &self.parent.name())
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}

impl<P: Prefetcher> PrefetchEngine<P> {
    /// Creates an engine in front of `parent`.
    pub fn new(name: impl Into<String>, policy: P, parent: Arc<dyn MemObject>) -> Self {
        Self {
            name: name.into(),
            policy: Mutex::new(policy),
            parent,
            children: Children::new(),
        }
    }

    /// Adds a holder that receives forwarded invalidations.
    pub fn attach_child(&self, child: Weak<dyn Invalidate>) {
        self.children.attach(child);
    }

    /// Policy event counters.
    pub fn stats(&self) -> PrefetchStats {
        let mut stats = self
            .policy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats();
        stats.name.clone_from(&self.name);
        stats
    }
}

impl<P: Prefetcher> MemObject for PrefetchEngine<P> {
    fn access(&self, req: &mut MemReq) -> u64 {
        // Stores, write-backs and nested prefetches bypass the policy.
        if req.req_type != ReqType::Gets || req.is(ReqFlags::PREFETCH) {
            return self.parent.access(req);
        }

        let req_cycle = req.cycle;
        let core_id = req.core_id;
        let resp_cycle = self.parent.access(req);

        let parent = &self.parent;
        let mut issue = |line_addr: u64| {
            let mut pf = MemReq::new(line_addr, ReqType::Gets, req_cycle)
                .with_flags(ReqFlags::PREFETCH)
                .with_core(core_id);
            let resp = parent.access(&mut pf);
            trace!(line_addr, req_cycle, resp, "prefetch issued");
            resp
        };

        self.policy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_demand(req.line_addr, req_cycle, resp_cycle, &mut issue)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<P: Prefetcher> Invalidate for PrefetchEngine<P> {
    fn invalidate(&self, req: &InvReq) -> u64 {
        self.children.invalidate_all(req)
    }
}
