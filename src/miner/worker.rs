// src/miner/worker.rs
//! Solver worker thread
//!
//! Each solver is owned by one OS thread that follows the job board,
//! hashes its slice of the nonce space in chunks and queues any solutions
//! for the reactor thread.

use crate::miner::board::JobBoard;
use crate::miner::job::Solution;
use crate::miner::solver::Solver;
use crate::stats::SolverMetrics;
use crossbeam_channel::{Sender, TrySendError};
use log::{debug, error, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::Notify;

/// Longest a worker sleeps without work before re-checking `alive`
pub const IDLE_WAIT: Duration = Duration::from_secs(1);

/// Capacity of the solution queue shared by all workers
pub const SOLUTION_QUEUE_CAPACITY: usize = 256;

/// Handles shared between a worker thread and its pool
#[derive(Clone)]
pub struct WorkerContext {
    /// Published jobs
    pub board: Arc<JobBoard>,
    /// Solution queue (multi-producer, reactor consumes)
    pub solutions: Sender<Solution>,
    /// Wakes the reactor when solutions were queued
    pub waker: Arc<Notify>,
}

/// A running solver thread
pub struct Worker {
    index: usize,
    alive: Arc<AtomicBool>,
    metrics: Arc<SolverMetrics>,
    handle: Option<JoinHandle<Box<dyn Solver>>>,
}

impl Worker {
    /// Spawns the worker thread for solver `index`
    ///
    /// # Errors
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn(
        index: usize,
        solver: Box<dyn Solver>,
        context: WorkerContext,
    ) -> std::io::Result<Self> {
        let alive = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(SolverMetrics::new());

        let handle = {
            let alive = Arc::clone(&alive);
            let metrics = Arc::clone(&metrics);
            thread::Builder::new()
                .name(format!("solver-{}", index))
                .spawn(move || run(index, solver, context, alive, metrics))?
        };

        Ok(Worker {
            index,
            alive,
            metrics,
            handle: Some(handle),
        })
    }

    /// Solver index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Counters of this solver
    pub fn metrics(&self) -> &Arc<SolverMetrics> {
        &self.metrics
    }

    /// Asks the thread to exit at its next loop iteration
    pub fn signal_stop(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Joins the thread and returns the solver it owned
    ///
    /// Returns `None` if already joined or if the thread panicked.
    pub fn join(&mut self) -> Option<Box<dyn Solver>> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(solver) => Some(solver),
            Err(_) => {
                error!("Solver {} thread panicked", self.index);
                None
            }
        }
    }
}

/// What the worker is currently hashing
struct Assignment {
    sequence_id: u64,
    cursor: u32,
    nonce_to: u32,
}

fn run(
    index: usize,
    mut solver: Box<dyn Solver>,
    ctx: WorkerContext,
    alive: Arc<AtomicBool>,
    metrics: Arc<SolverMetrics>,
) -> Box<dyn Solver> {
    let mut seen = 0u64;
    let mut assignment: Option<Assignment> = None;

    debug!("Solver {} ({}) started", index, solver.backend());

    while alive.load(Ordering::Acquire) {
        if ctx.board.version() != seen {
            if let Some(job) = ctx.board.snapshot() {
                seen = job.version;
                assignment = match (job.slices.get(index), solver.set_job(&job.blob, job.target)) {
                    (Some(slice), Ok(())) => Some(Assignment {
                        sequence_id: job.version,
                        cursor: slice.nonce_from,
                        nonce_to: slice.nonce_to,
                    }),
                    (None, _) => {
                        error!("Solver {} has no slice in job {}", index, job.version);
                        None
                    }
                    (_, Err(e)) => {
                        error!("Solver {} rejected job {}: {}", index, job.version, e);
                        None
                    }
                };
            }
        }

        let Some(work) = assignment.as_mut().filter(|a| a.cursor < a.nonce_to) else {
            ctx.board.wait_for_change(seen, IDLE_WAIT);
            continue;
        };

        match solver.process(work.cursor, work.nonce_to - work.cursor) {
            Ok(batch) if batch.processed > 0 => {
                work.cursor = work.cursor.saturating_add(batch.processed).min(work.nonce_to);
                metrics.add_hashes(u64::from(batch.processed));

                let mut queued = false;
                for found in batch.found {
                    let solution = Solution {
                        job_sequence_id: work.sequence_id,
                        nonce: found.nonce,
                        hash: found.hash,
                    };
                    match ctx.solutions.try_send(solution) {
                        Ok(()) => queued = true,
                        Err(TrySendError::Full(dropped)) => warn!(
                            "Solution queue full, dropping nonce {:08x} from solver {}",
                            dropped.nonce, index
                        ),
                        Err(TrySendError::Disconnected(_)) => return solver,
                    }
                }
                if queued {
                    ctx.waker.notify_one();
                }
            }
            Ok(_) => {
                warn!("Solver {} made no progress on job {}", index, work.sequence_id);
                assignment = None;
            }
            Err(e) => {
                error!(
                    "Solver {} failed on job {}, skipping it: {}",
                    index, work.sequence_id, e
                );
                assignment = None;
            }
        }
    }

    debug!("Solver {} stopped", index);
    solver
}
