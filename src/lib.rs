//! CryptoNight Miner - resilient pool mining client in Rust
//!
//! This crate provides:
//! - Pool connections with DNS/connect retry, exponential backoff and
//!   priority failover across endpoints
//! - A solver pool that partitions the nonce space across CPU or GPU
//!   solvers, each on its own worker thread
//! - Stale-solution filtering and periodic hash rate metrics
//! - A stratum codec and the orchestrator wiring it all together

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

/// Orchestrator wiring network, protocol and solvers
pub mod foreman;

/// Solvers, jobs and the solver pool
pub mod miner;

/// Pool endpoints, connections and failover
pub mod network;

/// Stratum wire protocol
pub mod protocol;

/// Statistics collection and reporting functionality
pub mod stats;

/// Shared type definitions
pub mod types;

/// Utility functions and error handling
pub mod utils;

// Core exports
pub use cli::Commands;
pub use config::Config;
pub use foreman::Foreman;
pub use miner::{Algorithm, Job, Solution, Solver, SolverEvent, SolverPool};
pub use network::{
    ConnectionEvent, ConnectionPool, Endpoint, EndpointTable, TcpTransport, Transport,
};
pub use stats::{MetricsReport, StatsReporter};
pub use types::{AlgorithmType, SolverBackend};
pub use utils::{MinerError, init_logging};
