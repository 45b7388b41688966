//! Statistics collection and reporting module
//!
//! - [`SolverMetrics`]: lock-free per-solver counters written by workers
//! - [`MetricsReport`]: snapshot taken on the metrics timer
//! - [`StatsReporter`]: logs the metrics line with share and host figures
//!

/// Per-solver counters and snapshots
pub mod metrics;

/// Periodic metrics line with share counts and hardware figures
pub mod reporter;

// Re-export main components
pub use metrics::{MetricsReport, SolverMetrics, SolverSnapshot};
pub use reporter::{HardwareStats, ShareResult, StatsReporter};
