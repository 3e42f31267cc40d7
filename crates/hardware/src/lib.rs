//! Cycle-level out-of-order core timing model.
//!
//! This crate times basic blocks of decoded micro-ops through an out-of-order
//! pipeline and a shared memory hierarchy. It provides the following:
//! 1. **Core:** Block-at-a-time decode/issue/dispatch/commit timing with resource
//!    trackers, a register scoreboard, store-to-load forwarding, and a fetch front end.
//! 2. **Memory:** Core filter caches, a shared timing cache, and fixed-latency or
//!    M/D/1 queueing memory channels.
//! 3. **Prefetch:** Stride and access-map prefetch engines on the data path.
//! 4. **Simulation:** Configuration, hierarchy wiring, access tracing, and statistics.

/// Common types and constants (stage offsets, request types, line states, errors).
pub mod common;
/// Model configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// Out-of-order core (timing loop, front end, trackers, predictors).
pub mod core;
/// Memory hierarchy construction from configuration.
pub mod hierarchy;
/// Memory-side collaborators (requests, filter caches, shared cache, channels).
pub mod mem;
/// Prefetch engine and policies.
pub mod prefetch;
/// Statistics collection and reporting.
pub mod stats;
/// Memory access trace output.
pub mod trace;

/// Root configuration type; use `Config::default()` or load it from JSON.
pub use crate::config::Config;
/// Core timing model; construct with `OooCore::builder`.
pub use crate::core::OooCore;
/// Memory hierarchy; construct with `HierarchyBuilder::new`.
pub use crate::hierarchy::{Hierarchy, HierarchyBuilder};
