// src/miner/mod.rs
//! Core mining functionality
//!
//! This module contains all components related to the hashing side:
//! - Hash function backends (CryptoNight)
//! - Job model and nonce partitioning
//! - Solvers and their worker threads
//! - The solver pool that dispatches jobs and collects solutions

/// Hash function implementations
pub mod algorithm;

/// Versioned job publication shared with worker threads
pub mod board;

/// Jobs, nonce slices, solutions and target arithmetic
pub mod job;

/// Solver pool: job fan-out, stale filtering, metrics
pub mod pool;

/// Solver backends (CPU, GPU kernels)
pub mod solver;

/// Worker thread loop driving one solver
pub mod worker;

// Re-export main components for cleaner imports
pub use self::algorithm::Algorithm;
pub use self::job::{Job, NonceSlice, Solution};
pub use self::pool::{SolverEvent, SolverPool};
pub use self::solver::{Batch, Found, Solver};
