//! Shared helpers for the timing model tests.

/// Micro-op, block, and core builders.
pub mod builder;


/// Routes model events to the test output once per test binary.
///
/// Set `RUST_LOG=debug` to see phase, join, and latency-update events.
pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .try_init();
}
