//! Tracing/logging initialization.
//!
//! JSON lines with timestamps; verbosity comes from `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Default directive when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_default_filter(DEFAULT_FILTER);
}

/// Like [`init`], but with a caller-chosen fallback directive
/// (e.g. `"bizdesk_http=debug"` for the probe binary).
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_with_default_filter(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
