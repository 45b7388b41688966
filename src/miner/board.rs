// src/miner/board.rs
//! Job publication from the reactor thread to solver workers
//!
//! The reactor is the only writer. It stores a complete, immutable snapshot
//! first and bumps the version afterwards, so a worker that observes a new
//! version always finds the matching snapshot. Workers never see a job with
//! fields from two different publications.

use crate::miner::job::NonceSlice;
use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Everything a worker needs to start on a job
#[derive(Debug)]
pub struct PublishedJob {
    /// Job version; equal to the job's `sequence_id`
    pub version: u64,
    /// Hashing blob shared by all solvers
    pub blob: Arc<[u8]>,
    /// 64-bit target
    pub target: u64,
    /// One slice per solver, indexed by solver
    pub slices: Vec<NonceSlice>,
}

/// Single-writer, multi-reader job slot with a wake-up signal
#[derive(Debug, Default)]
pub struct JobBoard {
    version: AtomicU64,
    current: ArcSwapOption<PublishedJob>,
    lock: Mutex<()>,
    changed: Condvar,
}

impl JobBoard {
    /// Creates an empty board at version 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest published version (0 before the first job)
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> Option<Arc<PublishedJob>> {
        self.current.load_full()
    }

    /// Publishes `job` and wakes idle workers
    pub fn publish(&self, job: PublishedJob) {
        let version = job.version;
        self.current.store(Some(Arc::new(job)));
        {
            let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
            self.version.store(version, Ordering::Release);
        }
        self.changed.notify_all();
    }

    /// Wakes every waiting worker without publishing (shutdown)
    pub fn wake_all(&self) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.changed.notify_all();
    }

    /// Blocks until the version differs from `seen` or `timeout` elapses
    ///
    /// Returns true if a newer version is available.
    pub fn wait_for_change(&self, seen: u64, timeout: Duration) -> bool {
        let guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.version.load(Ordering::Acquire) != seen {
            return true;
        }
        let _ = self
            .changed
            .wait_timeout(guard, timeout)
            .unwrap_or_else(|e| e.into_inner());
        self.version.load(Ordering::Acquire) != seen
    }
}
