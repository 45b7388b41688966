// src/miner/algorithm/mod.rs
//! Hash function backends
//!
//! Solvers only see the [`Algorithm`] trait: a pure function from a hashing
//! blob and a nonce to a 32-byte digest.

/// CryptoNight algorithm implementations
pub mod cryptonight;

use crate::miner::job::NONCE_OFFSET;
use crate::types::AlgorithmType;
use crate::utils::error::MinerError;

/// Common interface for all hash functions
pub trait Algorithm: Send + Sync {
    /// Compute the hash of `input` with `nonce` written at the nonce offset
    ///
    /// # Arguments
    /// * `input` - The hashing blob received from the pool
    /// * `nonce` - The nonce value to use in the hash computation
    ///
    /// # Returns
    /// 32-byte hash result or error if computation fails
    fn hash(&self, input: &[u8], nonce: u32) -> Result<[u8; 32], MinerError>;

    /// Get the algorithm type
    fn algorithm_type(&self) -> AlgorithmType;
}

/// Writes `nonce` little-endian into `blob` at the nonce offset
///
/// # Errors
/// `InputError` if the blob is too short to hold a nonce.
pub fn insert_nonce(blob: &mut [u8], nonce: u32) -> Result<(), MinerError> {
    let len = blob.len();
    let slot = blob
        .get_mut(NONCE_OFFSET..NONCE_OFFSET + 4)
        .ok_or_else(|| {
            MinerError::InputError(format!("Blob too short for nonce: {} bytes", len))
        })?;
    slot.copy_from_slice(&nonce.to_le_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_lands_at_offset_39() {
        let mut blob = [0u8; 76];
        insert_nonce(&mut blob, 0xAABB_CCDD).unwrap();
        assert_eq!(&blob[39..43], &[0xDD, 0xCC, 0xBB, 0xAA]);
        assert!(blob[..39].iter().all(|&b| b == 0));
        assert!(insert_nonce(&mut [0u8; 40], 1).is_err());
    }

    #[test]
    fn short_blob_error_reports_its_length() {
        let mut blob = [7u8; 40];
        match insert_nonce(&mut blob, 1) {
            Err(MinerError::InputError(msg)) => assert!(msg.contains("40 bytes"), "{}", msg),
            other => panic!("unexpected {:?}", other),
        }
        assert!(blob.iter().all(|&b| b == 7));
    }
}
