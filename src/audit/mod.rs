//! Audit trail for pipeline runs.
//!
//! Tracks how much data each run touched so operators can see what was
//! read, dropped and produced.

pub mod log;

// Re-export commonly used types
pub use log::{RunLog, RunStats, RUN_STATS_FILE};
