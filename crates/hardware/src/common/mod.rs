//! Common types and constants shared across the timing model.
//!
//! This module provides the building blocks used by both the core and the memory side:
//! 1. **Constants:** Pipeline stage offsets, fixed latencies, and sentinel values.
//! 2. **Request Types:** Coherence request kinds, request flags, and line states.
//! 3. **Error Handling:** Configuration and construction errors.

/// Pipeline constants and sentinels.
pub mod constants;

/// Memory request and line-state definitions.
pub mod data;

/// Error types.
pub mod error;

pub use data::{LineState, ReqFlags, ReqType};
pub use error::ConfigError;
