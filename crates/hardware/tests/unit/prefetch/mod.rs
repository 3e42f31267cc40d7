//! Prefetch policy tests.


/// Per-page stride detection.
pub mod stride;
