// src/miner/solver/cpu.rs
//! CPU solver: hashes nonces sequentially on the worker thread

use crate::miner::algorithm::Algorithm;
use crate::miner::job::{meets_target, validate_blob};
use crate::miner::solver::{Batch, Found, Solver};
use crate::types::SolverBackend;
use crate::utils::error::MinerError;
use std::sync::Arc;

/// Solver backed by a CPU hash function
pub struct CpuSolver {
    algorithm: Arc<dyn Algorithm>,
    blob: Vec<u8>,
    target: u64,
    batch_size: u32,
    loaded: bool,
}

impl CpuSolver {
    /// Creates a CPU solver hashing at most `batch_size` nonces per call
    pub fn new(algorithm: Arc<dyn Algorithm>, batch_size: u32) -> Self {
        CpuSolver {
            algorithm,
            blob: Vec::new(),
            target: 0,
            batch_size: batch_size.max(1),
            loaded: false,
        }
    }
}

impl Solver for CpuSolver {
    fn backend(&self) -> SolverBackend {
        SolverBackend::Cpu
    }

    fn set_job(&mut self, blob: &[u8], target: u64) -> Result<(), MinerError> {
        validate_blob(blob)?;
        self.blob.clear();
        self.blob.extend_from_slice(blob);
        self.target = target;
        self.loaded = true;
        Ok(())
    }

    fn process(&mut self, nonce_from: u32, max_nonces: u32) -> Result<Batch, MinerError> {
        if !self.loaded {
            return Err(MinerError::InputError("No job loaded".into()));
        }

        let count = self.batch_size.min(max_nonces);
        let mut found = Vec::new();
        for i in 0..count {
            let nonce = nonce_from.wrapping_add(i);
            let hash = self.algorithm.hash(&self.blob, nonce)?;
            if meets_target(&hash, self.target) {
                found.push(Found { nonce, hash });
            }
        }

        Ok(Batch {
            processed: count,
            found,
        })
    }

    fn shutdown(&mut self) {
        self.blob = Vec::new();
        self.loaded = false;
    }
}
