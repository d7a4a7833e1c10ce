//! Tracing and logging setup shared by every bizdesk binary and test harness.

/// Tracing configuration (filters, formatting).
pub mod tracing;

pub use self::tracing::{init, init_with_default_filter};
