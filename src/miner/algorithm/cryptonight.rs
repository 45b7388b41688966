// src/miner/algorithm/cryptonight.rs
//! CryptoNight algorithm implementation
//!
//! Thin wrapper over the `cryptonight` primitive. The struct only tracks the
//! variant; scratchpad management lives in the underlying library.

use crate::miner::algorithm::{Algorithm, insert_nonce};
use crate::types::AlgorithmType;
use crate::utils::error::MinerError;
use cryptonight::cryptonight;

/// CryptoNight hash function for one variant
pub struct CryptoNightAlgo {
    algorithm: AlgorithmType,
}

impl CryptoNightAlgo {
    /// Creates a CryptoNight hasher for the given variant
    pub fn new(algorithm: AlgorithmType) -> Self {
        Self { algorithm }
    }
}

impl Algorithm for CryptoNightAlgo {
    /// Computes a CryptoNight hash for the given blob and nonce
    ///
    /// 1. Copies the blob and writes the nonce at offset 39 (little-endian)
    /// 2. Computes the CryptoNight hash using the configured variant
    /// 3. Returns the fixed-length hash result
    fn hash(&self, input: &[u8], nonce: u32) -> Result<[u8; 32], MinerError> {
        let mut data = input.to_vec();
        insert_nonce(&mut data, nonce)?;

        let hash = cryptonight(&data, data.len(), self.algorithm.variant());
        hash.try_into().map_err(|h: Vec<u8>| {
            MinerError::AlgorithmError(format!("CryptoNight returned {} bytes", h.len()))
        })
    }

    fn algorithm_type(&self) -> AlgorithmType {
        self.algorithm
    }
}
