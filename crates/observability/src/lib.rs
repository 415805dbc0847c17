//! Tracing and logging setup shared by binaries and test harnesses.

/// Initialize process-wide observability with JSON logs.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize with an explicit configuration.
pub fn init_with(config: &LogConfig) {
    tracing::init_with(config);
}

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use tracing::{LogConfig, LogConfigError, LogFormat};
