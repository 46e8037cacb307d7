//! Tracing/logging setup shared by ledgerpost binaries.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use tracing::{LOG_FORMAT_ENV, LogConfig, LogFormat, init, init_with};
