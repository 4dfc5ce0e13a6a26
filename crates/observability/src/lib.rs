//! Logging setup shared by facturo binaries and tests.

/// Initialize process-wide tracing (JSON, filtered by `RUST_LOG`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Human-readable tracing captured by the test harness.
pub fn init_for_tests() {
    tracing::init_for_tests();
}

/// Subscriber construction.
pub mod tracing;
