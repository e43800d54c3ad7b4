//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Initialize tracing/logging for the process.
///
/// Reads `RUST_LOG` for the filter, falling back to `info`. Safe to call
/// multiple times; subsequent calls are no-ops.
pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

/// Like [`init`], with an explicit fallback filter (tests use `warn`).
pub fn init_with_filter(fallback: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // JSON lines to stdout; one object per event.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_target(false)
        .try_init();
}
