// src/miner/solver/gpu.rs
//! GPU solver
//!
//! Kernel compilation and dispatch belong to the device layer. This adapter
//! turns any [`GpuKernel`] into a [`Solver`]: the kernel reports candidate
//! nonces and every candidate is re-hashed on the host before it is
//! reported, so a misbehaving device can never submit a bad share.

use crate::miner::algorithm::Algorithm;
use crate::miner::job::{meets_target, validate_blob};
use crate::miner::solver::{Batch, Found, Solver};
use crate::types::SolverBackend;
use crate::utils::error::MinerError;
use log::warn;
use std::sync::Arc;

/// A compiled compute kernel bound to one device
pub trait GpuKernel: Send {
    /// `OpenCl` or `Vulkan`
    fn backend(&self) -> SolverBackend;

    /// Nonces hashed per dispatch
    fn intensity(&self) -> u32;

    /// Uploads the blob and target to device buffers
    fn load(&mut self, blob: &[u8], target: u64) -> Result<(), MinerError>;

    /// Runs `count` nonces from `nonce_from`, blocking until the device is
    /// idle, and returns the nonces whose hash met the target
    fn dispatch(&mut self, nonce_from: u32, count: u32) -> Result<Vec<u32>, MinerError>;

    /// Frees device buffers and contexts
    fn release(&mut self);
}

/// Solver running on a GPU kernel
pub struct GpuSolver<K: GpuKernel> {
    kernel: K,
    verifier: Arc<dyn Algorithm>,
    blob: Vec<u8>,
    target: u64,
    loaded: bool,
    released: bool,
}

impl<K: GpuKernel> GpuSolver<K> {
    /// Wraps `kernel`; `verifier` re-hashes candidates on the host
    pub fn new(kernel: K, verifier: Arc<dyn Algorithm>) -> Self {
        GpuSolver {
            kernel,
            verifier,
            blob: Vec::new(),
            target: 0,
            loaded: false,
            released: false,
        }
    }
}

impl<K: GpuKernel> Solver for GpuSolver<K> {
    fn backend(&self) -> SolverBackend {
        self.kernel.backend()
    }

    fn set_job(&mut self, blob: &[u8], target: u64) -> Result<(), MinerError> {
        validate_blob(blob)?;
        self.kernel.load(blob, target)?;
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

        let count = self.kernel.intensity().min(max_nonces);
        let candidates = self.kernel.dispatch(nonce_from, count)?;

        let mut found = Vec::with_capacity(candidates.len());
        for nonce in candidates {
            let hash = self.verifier.hash(&self.blob, nonce)?;
            if meets_target(&hash, self.target) {
                found.push(Found { nonce, hash });
            } else {
                warn!(
                    "{} kernel reported nonce {:08x} that fails host verification",
                    self.kernel.backend(),
                    nonce
                );
            }
        }

        Ok(Batch {
            processed: count,
            found,
        })
    }

    fn shutdown(&mut self) {
        if !self.released {
            self.kernel.release();
            self.released = true;
        }
    }
}
