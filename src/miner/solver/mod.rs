// src/miner/solver/mod.rs
//! Solver backends
//!
//! A solver hashes one chunk of nonces at a time for the job it was last
//! given. Each solver is driven by exactly one worker thread, so
//! implementations need `Send` but not `Sync`.

/// CPU solver
pub mod cpu;

/// GPU solver adapter over an external compute kernel
pub mod gpu;

pub use cpu::CpuSolver;
pub use gpu::{GpuKernel, GpuSolver};

use crate::miner::algorithm::Algorithm;
use crate::types::SolverBackend;
use crate::utils::error::MinerError;
use std::sync::Arc;

/// A nonce whose hash met the current target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    /// Winning nonce
    pub nonce: u32,
    /// Its hash
    pub hash: [u8; 32],
}

/// Result of one `process` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    /// Nonces hashed, starting at the requested `nonce_from`
    pub processed: u32,
    /// Winning nonces in this chunk
    pub found: Vec<Found>,
}

/// Hashing capability implemented by every backend
pub trait Solver: Send {
    /// Backend kind, for logs and metrics
    fn backend(&self) -> SolverBackend;

    /// Loads a new hashing context
    ///
    /// # Errors
    /// `InputError` on a malformed blob; the previously loaded job is kept.
    fn set_job(&mut self, blob: &[u8], target: u64) -> Result<(), MinerError>;

    /// Hashes up to `max_nonces` nonces starting at `nonce_from`
    ///
    /// An error means the backend cannot continue with the current job;
    /// the worker skips the job and waits for the next one.
    fn process(&mut self, nonce_from: u32, max_nonces: u32) -> Result<Batch, MinerError>;

    /// Releases backend resources; called once, after the worker is joined
    fn shutdown(&mut self);
}

/// Builds `count` solvers for `backend`
///
/// # Errors
/// `DeviceError` for GPU backends: compute kernels are not part of this
/// build and must be supplied through [`GpuSolver::new`].
pub fn build(
    backend: SolverBackend,
    algorithm: Arc<dyn Algorithm>,
    count: usize,
    batch_size: u32,
) -> Result<Vec<Box<dyn Solver>>, MinerError> {
    if count == 0 {
        return Err(MinerError::ConfigError("Solver count must be at least 1".into()));
    }

    match backend {
        SolverBackend::Cpu => Ok((0..count)
            .map(|_| {
                Box::new(CpuSolver::new(Arc::clone(&algorithm), batch_size)) as Box<dyn Solver>
            })
            .collect()),
        SolverBackend::OpenCl | SolverBackend::Vulkan => Err(MinerError::DeviceError(format!(
            "No {} compute kernel is available in this build",
            backend
        ))),
    }
}
