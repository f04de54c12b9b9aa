//! Process-wide logging setup shared by the engine's binaries and tests.

/// Initialize structured JSON logging at `info`, overridable through `RUST_LOG`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing subscriber configuration (filters, layers).
pub mod tracing;
