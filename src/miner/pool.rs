// src/miner/pool.rs
//! Solver pool
//!
//! Owns the solver workers, partitions the nonce space for every new job,
//! filters stale solutions and produces periodic metrics. All methods run on
//! the reactor thread.

use crate::miner::board::{JobBoard, PublishedJob};
use crate::miner::job::{
    Job, NonceSlice, Solution, chunk_size, hash_value, partition, validate_blob,
};
use crate::miner::solver::Solver;
use crate::miner::worker::{SOLUTION_QUEUE_CAPACITY, Worker, WorkerContext};
use crate::stats::{MetricsReport, SolverSnapshot};
use crate::types::SolverBackend;
use crate::utils::error::MinerError;
use crossbeam_channel::Receiver;
use log::{debug, info, warn};
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Default period of the metrics tick
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Events emitted to the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum SolverEvent {
    /// A solution for the current job
    SolutionFound(Solution),
    /// Periodic hash rate snapshot
    MetricsTick(MetricsReport),
}

/// Owns N solvers and fans jobs out to them
pub struct SolverPool {
    board: Arc<JobBoard>,
    workers: Vec<Worker>,
    backends: Vec<SolverBackend>,
    solutions: Receiver<Solution>,
    waker: Arc<Notify>,
    pending: VecDeque<Solution>,
    current: Option<Job>,
    metrics_interval: Duration,
    ticker: Option<Interval>,
    started: Instant,
    last_tick: Instant,
    stopped: bool,
}

impl SolverPool {
    /// Starts one worker thread per solver
    ///
    /// # Errors
    /// `ConfigError` for an empty solver list, `IoError` if a thread
    /// cannot be spawned (already started workers are stopped again).
    pub fn new(
        solvers: Vec<Box<dyn Solver>>,
        metrics_interval: Duration,
    ) -> Result<Self, MinerError> {
        if solvers.is_empty() {
            return Err(MinerError::ConfigError("At least one solver is required".into()));
        }

        let board = Arc::new(JobBoard::new());
        let waker = Arc::new(Notify::new());
        let (tx, rx) = crossbeam_channel::bounded(SOLUTION_QUEUE_CAPACITY);
        let context = WorkerContext {
            board: Arc::clone(&board),
            solutions: tx,
            waker: Arc::clone(&waker),
        };

        let now = Instant::now();
        let mut pool = SolverPool {
            board,
            workers: Vec::with_capacity(solvers.len()),
            backends: solvers.iter().map(|s| s.backend()).collect(),
            solutions: rx,
            waker,
            pending: VecDeque::new(),
            current: None,
            metrics_interval,
            ticker: None,
            started: now,
            last_tick: now,
            stopped: false,
        };

        for (index, solver) in solvers.into_iter().enumerate() {
            let worker = Worker::spawn(index, solver, context.clone())?;
            pool.workers.push(worker);
        }

        info!("Started {} solver(s)", pool.workers.len());
        Ok(pool)
    }

    /// Number of solvers
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Always false for a constructed pool
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Version of the current job (0 before the first)
    pub fn job_version(&self) -> u64 {
        self.board.version()
    }

    /// Job currently being worked on
    pub fn current_job(&self) -> Option<&Job> {
        self.current.as_ref()
    }

    /// Publishes a new job and returns its sequence id
    ///
    /// # Errors
    /// `InputError` if the blob is malformed; the current job keeps running.
    pub fn new_job(
        &mut self,
        job_id: impl Into<String>,
        blob: Vec<u8>,
        target: u64,
    ) -> Result<u64, MinerError> {
        let job_id = job_id.into();
        if let Err(e) = validate_blob(&blob) {
            warn!("Rejected job {}: {}", job_id, e);
            return Err(e);
        }

        let sequence_id = self.board.version() + 1;
        let solvers = self.workers.len();
        let offset = rand::thread_rng().gen_range(0..chunk_size(solvers));
        let slices = partition(sequence_id, solvers, offset);

        debug!(
            "Job {} (#{}) target {:016x}, nonces from {:08x}",
            job_id, sequence_id, target, offset
        );

        self.board.publish(PublishedJob {
            version: sequence_id,
            blob: Arc::from(blob.as_slice()),
            target,
            slices,
        });
        self.current = Some(Job {
            sequence_id,
            job_id,
            blob,
            target,
        });
        Ok(sequence_id)
    }

    /// Slices assigned for the current job
    pub fn slices(&self) -> Vec<NonceSlice> {
        self.board
            .snapshot()
            .map(|job| job.slices.clone())
            .unwrap_or_default()
    }

    /// Drains the solution queue, keeping only solutions for the current job
    pub fn collect_solutions(&mut self) -> usize {
        let version = self.board.version();
        let mut accepted = 0;

        for solution in self.solutions.try_iter() {
            if solution.job_sequence_id != version {
                warn!(
                    "Discarding stale solution {:08x} for job #{} (current #{})",
                    solution.nonce, solution.job_sequence_id, version
                );
                continue;
            }
            accepted += 1;
            self.pending.push_back(solution);
        }
        accepted
    }

    /// Records a solution against the solver whose slice contains its nonce
    fn record(&self, solution: &Solution) {
        let Some(job) = self.board.snapshot() else {
            return;
        };
        let owner = job
            .slices
            .iter()
            .position(|s| (s.nonce_from..s.nonce_to).contains(&solution.nonce));
        if let Some(worker) = owner.and_then(|i| self.workers.get(i)) {
            worker.metrics().record_solution(hash_value(&solution.hash));
        }
    }

    /// Snapshots every solver's counters
    pub fn metrics(&mut self) -> MetricsReport {
        let now = Instant::now();
        let interval = now - self.last_tick;
        let uptime = now - self.started;
        self.last_tick = now;

        let solvers: Vec<SolverSnapshot> = self
            .workers
            .iter()
            .zip(&self.backends)
            .map(|(worker, &backend)| {
                worker
                    .metrics()
                    .snapshot(worker.index(), backend, interval, uptime)
            })
            .collect();

        MetricsReport {
            interval,
            uptime,
            solvers,
        }
    }

    /// Waits for the next accepted solution or metrics tick
    ///
    /// Returns `None` once stopped. Cancel-safe.
    pub async fn next_event(&mut self) -> Option<SolverEvent> {
        loop {
            if self.stopped {
                return None;
            }
            self.collect_solutions();
            if let Some(solution) = self.pending.pop_front() {
                self.record(&solution);
                return Some(SolverEvent::SolutionFound(solution));
            }

            let period = self.metrics_interval;
            let ticker = self.ticker.get_or_insert_with(|| {
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });

            let ticked = tokio::select! {
                _ = self.waker.notified() => false,
                _ = ticker.tick() => true,
            };
            if ticked {
                return Some(SolverEvent::MetricsTick(self.metrics()));
            }
        }
    }

    /// Stops and joins every worker, then shuts the solvers down
    ///
    /// Safe to call any number of times.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        for worker in &self.workers {
            worker.signal_stop();
        }
        self.board.wake_all();

        for worker in &mut self.workers {
            if let Some(mut solver) = worker.join() {
                solver.shutdown();
            }
        }
        self.pending.clear();
        info!("Solver pool stopped");
    }
}

impl Drop for SolverPool {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::job::NONCE_OFFSET;
    use crate::miner::solver::{Batch, Found};
    use std::sync::Mutex;

    /// Records every call; optionally reports nonce_from as a solution
    #[derive(Clone, Default)]
    struct CallLog {
        jobs: Arc<Mutex<Vec<(Vec<u8>, u64)>>>,
        calls: Arc<Mutex<Vec<(u32, u32)>>>,
        shutdowns: Arc<Mutex<usize>>,
    }

    struct CallLogSolver {
        log: CallLog,
        report: bool,
    }

    impl Solver for CallLogSolver {
        fn backend(&self) -> SolverBackend {
            SolverBackend::Cpu
        }

        fn set_job(&mut self, blob: &[u8], target: u64) -> Result<(), MinerError> {
            validate_blob(blob)?;
            self.log.jobs.lock().unwrap().push((blob.to_vec(), target));
            Ok(())
        }

        fn process(&mut self, nonce_from: u32, max_nonces: u32) -> Result<Batch, MinerError> {
            let processed = max_nonces.min(1 << 20);
            self.log.calls.lock().unwrap().push((nonce_from, processed));
            let found = if self.report {
                self.report = false;
                vec![Found {
                    nonce: nonce_from,
                    hash: [0u8; 32],
                }]
            } else {
                Vec::new()
            };
            Ok(Batch { processed, found })
        }

        fn shutdown(&mut self) {
            *self.log.shutdowns.lock().unwrap() += 1;
        }
    }

    fn call_logs(n: usize, report: bool) -> (CallLog, Vec<Box<dyn Solver>>) {
        let log = CallLog::default();
        let solvers = (0..n)
            .map(|_| {
                Box::new(CallLogSolver {
                    log: log.clone(),
                    report,
                }) as Box<dyn Solver>
            })
            .collect();
        (log, solvers)
    }

    #[test]
    fn empty_solver_list_is_rejected() {
        assert!(SolverPool::new(Vec::new(), DEFAULT_METRICS_INTERVAL).is_err());
    }

    #[test]
    fn new_job_partitions_nonce_space() {
        let (_log, solvers) = call_logs(3, false);
        let mut pool = SolverPool::new(solvers, DEFAULT_METRICS_INTERVAL).unwrap();

        let seq = pool.new_job("a", vec![7u8; 76], 0x00FF_FFFF_FFFF_FFFF).unwrap();
        assert_eq!(seq, 1);
        let slices = pool.slices();
        let chunk = chunk_size(3);
        assert_eq!(slices.len(), 3);
        assert!(slices[0].nonce_from < chunk);
        for pair in slices.windows(2) {
            assert_eq!(pair[0].nonce_to, pair[1].nonce_from);
        }
        pool.stop();
    }

    #[test]
    fn malformed_job_keeps_previous() {
        let (_log, solvers) = call_logs(1, false);
        let mut pool = SolverPool::new(solvers, DEFAULT_METRICS_INTERVAL).unwrap();
        pool.new_job("good", vec![1u8; 76], 5).unwrap();

        assert!(pool.new_job("bad", vec![1u8; NONCE_OFFSET], 5).is_err());
        assert_eq!(pool.job_version(), 1);
        assert_eq!(pool.current_job().unwrap().job_id, "good");
    }

    #[test]
    fn stale_solutions_are_discarded() {
        let (_log, solvers) = call_logs(1, false);
        let mut pool = SolverPool::new(solvers, DEFAULT_METRICS_INTERVAL).unwrap();
        pool.new_job("one", vec![0u8; 76], 1).unwrap();
        pool.new_job("two", vec![0u8; 76], 1).unwrap();

        let tx = {
            // Same queue the workers use
            let (tx, rx) = crossbeam_channel::bounded(4);
            pool.solutions = rx;
            tx
        };
        tx.send(Solution {
            job_sequence_id: 1,
            nonce: 1,
            hash: [0; 32],
        })
        .unwrap();
        tx.send(Solution {
            job_sequence_id: 2,
            nonce: 2,
            hash: [0; 32],
        })
        .unwrap();

        assert_eq!(pool.collect_solutions(), 1);
        assert_eq!(pool.pending.len(), 1);
        assert_eq!(pool.pending[0].nonce, 2);
    }

    #[test]
    fn stop_is_idempotent_and_shuts_down_each_solver_once() {
        let (log, solvers) = call_logs(4, false);
        let mut pool = SolverPool::new(solvers, DEFAULT_METRICS_INTERVAL).unwrap();
        pool.new_job("x", vec![0u8; 76], 0).unwrap();

        pool.stop();
        pool.stop();
        drop(pool);
        assert_eq!(*log.shutdowns.lock().unwrap(), 4);
    }

    #[tokio::test]
    async fn solutions_for_current_job_are_forwarded() {
        let (_log, solvers) = call_logs(2, true);
        let mut pool = SolverPool::new(solvers, Duration::from_secs(3600)).unwrap();
        let seq = pool.new_job("j", vec![0u8; 76], u64::MAX).unwrap();

        let mut nonces = Vec::new();
        while nonces.len() < 2 {
            match pool.next_event().await {
                Some(SolverEvent::SolutionFound(solution)) => {
                    assert_eq!(solution.job_sequence_id, seq);
                    nonces.push(solution.nonce);
                }
                other => panic!("unexpected event {:?}", other),
            }
        }

        let slices = pool.slices();
        nonces.sort_unstable();
        assert_eq!(nonces, vec![slices[0].nonce_from, slices[1].nonce_from]);

        let report = pool.metrics();
        assert_eq!(report.solutions_found(), 2);
        pool.stop();
    }
}
