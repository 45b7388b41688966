// src/foreman.rs
//! Orchestrator
//!
//! Glues the connection pool, the stratum codec and the solver pool
//! together on the reactor thread:
//! connection bytes -> stratum decode -> `SolverPool::new_job`, and
//! solver solutions -> stratum encode -> `ConnectionPool::write`.

use crate::miner::job::target_to_difficulty;
use crate::miner::pool::{SolverEvent, SolverPool};
use crate::network::pool::{ConnectionEvent, ConnectionPool};
use crate::network::transport::Transport;
use crate::protocol::stratum::{PoolMessage, StratumSession};
use crate::stats::{ShareResult, StatsReporter};
use crate::utils::error::MinerError;
use log::{debug, error, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Runs a mining session until shut down
pub struct Foreman<T: Transport> {
    connections: ConnectionPool<T>,
    solvers: SolverPool,
    session: StratumSession,
    reporter: StatsReporter,
    keepalive: Option<Duration>,
    connected: bool,
    /// Sequence id of the last job the current pool session pushed
    session_job: Option<u64>,
}

impl<T: Transport> Foreman<T> {
    /// Wires the components; nothing is started yet
    pub fn new(
        connections: ConnectionPool<T>,
        solvers: SolverPool,
        session: StratumSession,
        keepalive: Option<Duration>,
    ) -> Self {
        Foreman {
            connections,
            solvers,
            session,
            reporter: StatsReporter::new(),
            keepalive,
            connected: false,
            session_job: None,
        }
    }

    /// Mines until `shutdown` resolves, then stops both pools
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<(), MinerError> {
        tokio::pin!(shutdown);
        self.connections.start();

        // A disabled keepalive still needs a timer to select on
        let period = self.keepalive.unwrap_or(Duration::from_secs(3600));
        let mut keepalive = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                event = self.connections.next_event() => match event {
                    Some(event) => self.on_connection_event(event),
                    None => break,
                },
                event = self.solvers.next_event() => match event {
                    Some(event) => self.on_solver_event(event),
                    None => break,
                },
                _ = keepalive.tick(), if self.keepalive.is_some() => self.send_keepalive(),
            }
        }

        self.connections.stop();
        self.solvers.stop();
        let (accepted, rejected) = self.reporter.shares();
        info!("Session finished: {} accepted, {} rejected", accepted, rejected);
        Ok(())
    }

    fn on_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected => {
                self.connected = true;
                self.session_job = None;
                self.session.reset();
                let login = self.session.login_request();
                self.write(login);
            }
            ConnectionEvent::Disconnected => {
                self.connected = false;
                self.session_job = None;
                self.session.reset();
                warn!("Disconnected from all pools; hashing continues on the last job");
            }
            ConnectionEvent::Data(bytes) => {
                for message in self.session.feed(&bytes) {
                    self.on_pool_message(message);
                }
            }
        }
    }

    fn on_pool_message(&mut self, message: PoolMessage) {
        match message {
            PoolMessage::LoginAccepted => info!("Logged in, waiting for work"),
            PoolMessage::LoginRejected(reason) => error!("Login rejected: {}", reason),
            PoolMessage::Job(job) => {
                let job_id = job.job_id.clone();
                let difficulty = target_to_difficulty(job.target);
                match self.solvers.new_job(job.job_id, job.blob, job.target) {
                    Ok(seq) => {
                        self.session_job = Some(seq);
                        info!("New job {} (#{}) diff {}", job_id, seq, difficulty);
                    }
                    Err(e) => error!("Job {} rejected: {}", job_id, e),
                }
            }
            PoolMessage::ShareAccepted => {
                self.reporter.record_share(ShareResult::Accepted);
                let (accepted, rejected) = self.reporter.shares();
                info!("Share accepted ({}/{})", accepted, accepted + rejected);
            }
            PoolMessage::ShareRejected(reason) => {
                self.reporter.record_share(ShareResult::Rejected);
                warn!("Share rejected: {}", reason);
            }
        }
    }

    fn on_solver_event(&mut self, event: SolverEvent) {
        match event {
            SolverEvent::SolutionFound(solution) => {
                let Some(job) = self.solvers.current_job() else {
                    return;
                };
                if !self.connected {
                    warn!("Dropping solution {:08x}: no pool connection", solution.nonce);
                    return;
                }
                // Job ids are only meaningful to the session that issued them
                if self.session_job != Some(solution.job_sequence_id) {
                    warn!(
                        "Dropping solution {:08x}: job {} is not from this pool session",
                        solution.nonce, job.job_id
                    );
                    return;
                }
                let job_id = job.job_id.clone();
                match self.session.submit_request(&job_id, solution.nonce, &solution.hash) {
                    Some(request) => {
                        debug!("Submitting nonce {:08x} for job {}", solution.nonce, job_id);
                        self.write(request);
                    }
                    None => warn!("Dropping solution {:08x}: not logged in", solution.nonce),
                }
            }
            SolverEvent::MetricsTick(report) => self.reporter.report(&report),
        }
    }

    fn send_keepalive(&mut self) {
        if !self.connected {
            return;
        }
        if let Some(request) = self.session.keepalive_request() {
            self.write(request);
        }
    }

    fn write(&mut self, bytes: Vec<u8>) {
        if let Err(e) = self.connections.write(bytes) {
            warn!("Pool write failed: {}", e);
        }
    }
}
