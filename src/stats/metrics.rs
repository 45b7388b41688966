// src/stats/metrics.rs
//! Per-solver counters and periodic snapshots
//!
//! Workers bump the counters from their own threads; the reactor thread
//! reads them on the metrics timer. Counters only promise eventual
//! freshness, never ordering with respect to jobs.

use crate::miner::job::target_to_difficulty;
use crate::types::SolverBackend;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Number of best solution values kept per solver
pub const TOP_K: usize = 10;

/// Counters owned by one solver
#[derive(Debug, Default)]
pub struct SolverMetrics {
    /// Hashes since the last snapshot; swapped to zero by the aggregator
    hashes_pending: AtomicU64,
    hashes_total: AtomicU64,
    solutions_found: AtomicU64,
    /// Lowest accepted hash values, ascending
    best: Mutex<Vec<u64>>,
}

impl SolverMetrics {
    /// Creates zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Worker side: count processed hashes
    pub fn add_hashes(&self, count: u64) {
        self.hashes_pending.fetch_add(count, Ordering::Relaxed);
    }

    /// Aggregator side: take the hashes since the last call
    pub fn take_hashes(&self) -> u64 {
        let delta = self.hashes_pending.swap(0, Ordering::Relaxed);
        self.hashes_total.fetch_add(delta, Ordering::Relaxed);
        delta
    }

    /// Hashes folded in by `take_hashes` so far
    pub fn hashes_total(&self) -> u64 {
        self.hashes_total.load(Ordering::Relaxed)
    }

    /// Records an accepted solution with its 64-bit hash value
    pub fn record_solution(&self, hash_value: u64) {
        self.solutions_found.fetch_add(1, Ordering::Relaxed);

        let mut best = self.best.lock().unwrap_or_else(|e| e.into_inner());
        if best.len() == TOP_K && best.last().is_some_and(|&worst| hash_value >= worst) {
            return;
        }
        let at = best.partition_point(|&v| v < hash_value);
        best.insert(at, hash_value);
        best.truncate(TOP_K);
    }

    /// Accepted solutions so far
    pub fn solutions_found(&self) -> u64 {
        self.solutions_found.load(Ordering::Relaxed)
    }

    /// Best (lowest) accepted hash values, ascending
    pub fn best_values(&self) -> Vec<u64> {
        self.best.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Folds pending hashes and builds a snapshot
    ///
    /// `elapsed` is the time since the previous snapshot, `uptime` the time
    /// since the solver started.
    pub fn snapshot(
        &self,
        index: usize,
        backend: SolverBackend,
        elapsed: Duration,
        uptime: Duration,
    ) -> SolverSnapshot {
        let delta = self.take_hashes();
        let total = self.hashes_total();
        SolverSnapshot {
            index,
            backend,
            hashes: delta,
            hashes_total: total,
            hashrate: rate(delta, elapsed),
            avg_hashrate: rate(total, uptime),
            solutions_found: self.solutions_found(),
            best_difficulty: self.best_values().first().map(|&v| target_to_difficulty(v)),
        }
    }
}

fn rate(hashes: u64, over: Duration) -> f64 {
    let secs = over.as_secs_f64();
    if secs > 0.0 { hashes as f64 / secs } else { 0.0 }
}

/// One solver's numbers at a metrics tick
#[derive(Debug, Clone, PartialEq)]
pub struct SolverSnapshot {
    /// Solver index
    pub index: usize,
    /// Backend kind
    pub backend: SolverBackend,
    /// Hashes since the previous tick
    pub hashes: u64,
    /// Hashes since start
    pub hashes_total: u64,
    /// Hash rate over the last interval (H/s)
    pub hashrate: f64,
    /// Hash rate since start (H/s)
    pub avg_hashrate: f64,
    /// Accepted solutions since start
    pub solutions_found: u64,
    /// Difficulty of the best solution found, if any
    pub best_difficulty: Option<u64>,
}

/// All solvers at one metrics tick
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsReport {
    /// Time covered by the instantaneous rates
    pub interval: Duration,
    /// Time since the solver pool started
    pub uptime: Duration,
    /// Per-solver figures
    pub solvers: Vec<SolverSnapshot>,
}

impl MetricsReport {
    /// Sum of instantaneous hash rates
    pub fn hashrate(&self) -> f64 {
        self.solvers.iter().map(|s| s.hashrate).sum()
    }

    /// Sum of lifetime average hash rates
    pub fn avg_hashrate(&self) -> f64 {
        self.solvers.iter().map(|s| s.avg_hashrate).sum()
    }

    /// Hashes since start across solvers
    pub fn hashes_total(&self) -> u64 {
        self.solvers.iter().map(|s| s.hashes_total).sum()
    }

    /// Accepted solutions across solvers
    pub fn solutions_found(&self) -> u64 {
        self.solvers.iter().map(|s| s.solutions_found).sum()
    }
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Hashrate: {:.2} H/s ({}s) | avg {:.2} H/s | solutions: {}",
            self.hashrate(),
            self.interval.as_secs(),
            self.avg_hashrate(),
            self.solutions_found()
        )
    }
}

impl fmt::Display for SolverSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {}: {:.2} H/s, avg {:.2} H/s, {} hashes, {} solutions",
            self.index,
            self.backend,
            self.hashrate,
            self.avg_hashrate,
            self.hashes_total,
            self.solutions_found
        )?;
        if let Some(best) = self.best_difficulty {
            write!(f, ", best diff {}", best)?;
        }
        Ok(())
    }
}
