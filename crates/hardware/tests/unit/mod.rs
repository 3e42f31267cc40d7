//! # Unit Components
//!
//! This module is the hub of the per-component tests. It covers the core timing
//! loop, the memory side, the prefetchers, and the configuration, trace, and
//! statistics layers around them.




/// Unit tests for the stride and AMPM prefetch policies.
pub mod prefetch;

/// Unit tests for statistics reporting.
pub mod stats;

/// Unit tests for the access trace.
pub mod trace;
