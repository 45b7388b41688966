// src/miner/job.rs
//! Jobs, nonce slices and solutions
//!
//! A job is never mutated once published; the pool announces new work by
//! publishing a new job with a higher `sequence_id`, which is also how stale
//! solutions are recognized.

use crate::utils::error::MinerError;

/// Largest hashing blob a job may carry
pub const MAX_BLOB_LEN: usize = 86;

/// Byte offset of the 32-bit nonce inside a CryptoNote hashing blob
pub const NONCE_OFFSET: usize = 39;

/// Smallest blob that still has room for the nonce
pub const MIN_BLOB_LEN: usize = NONCE_OFFSET + 4;

/// One unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Monotonic version assigned by the solver pool
    pub sequence_id: u64,
    /// Pool-side job identifier, echoed back on submit
    pub job_id: String,
    /// Hashing blob; the nonce bytes are overwritten per hash
    pub blob: Vec<u8>,
    /// A hash wins when its top 64 bits are below this value
    pub target: u64,
}

impl Job {
    /// Checks the blob length bounds
    pub fn validate(&self) -> Result<(), MinerError> {
        validate_blob(&self.blob)
    }
}

/// Rejects blobs that are too long or too short to hold the nonce
pub fn validate_blob(blob: &[u8]) -> Result<(), MinerError> {
    if blob.len() > MAX_BLOB_LEN {
        return Err(MinerError::InputError(format!(
            "Blob is {} bytes, maximum is {}",
            blob.len(),
            MAX_BLOB_LEN
        )));
    }
    if blob.len() < MIN_BLOB_LEN {
        return Err(MinerError::InputError(format!(
            "Blob is {} bytes, at least {} are required",
            blob.len(),
            MIN_BLOB_LEN
        )));
    }
    Ok(())
}

/// Half-open nonce range `[nonce_from, nonce_to)` owned by one solver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceSlice {
    /// Job this slice belongs to
    pub job_sequence_id: u64,
    /// First nonce
    pub nonce_from: u32,
    /// One past the last nonce
    pub nonce_to: u32,
}

impl NonceSlice {
    /// Number of nonces in the slice
    pub fn len(&self) -> u32 {
        self.nonce_to - self.nonce_from
    }

    /// True for an empty range
    pub fn is_empty(&self) -> bool {
        self.nonce_to == self.nonce_from
    }
}

/// A nonce whose hash met the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    /// Job the nonce was found for
    pub job_sequence_id: u64,
    /// Winning nonce
    pub nonce: u32,
    /// Resulting hash
    pub hash: [u8; 32],
}

/// Nonces per solver when the space is split across `num_solvers`
///
/// One chunk is left over so a random start offset below `chunk_size`
/// never wraps past `u32::MAX`.
pub fn chunk_size(num_solvers: usize) -> u32 {
    u32::MAX / (num_solvers as u32 + 1)
}

/// Splits the nonce space into `num_solvers` contiguous, disjoint slices
/// starting at `offset` (which must be below `chunk_size(num_solvers)`)
pub fn partition(job_sequence_id: u64, num_solvers: usize, offset: u32) -> Vec<NonceSlice> {
    let chunk = chunk_size(num_solvers);
    debug_assert!(offset < chunk);

    (0..num_solvers as u32)
        .map(|i| {
            let nonce_from = offset + i * chunk;
            NonceSlice {
                job_sequence_id,
                nonce_from,
                nonce_to: nonce_from + chunk,
            }
        })
        .collect()
}

/// Top 64 bits of a little-endian 256-bit hash
pub fn hash_value(hash: &[u8; 32]) -> u64 {
    let mut top = [0u8; 8];
    top.copy_from_slice(&hash[24..32]);
    u64::from_le_bytes(top)
}

/// True when `hash` is below `target`
pub fn meets_target(hash: &[u8; 32], target: u64) -> bool {
    hash_value(hash) < target
}

/// Difficulty equivalent of a 64-bit target
pub fn target_to_difficulty(target: u64) -> u64 {
    if target == 0 { u64::MAX } else { u64::MAX / target }
}

/// Expands a compact 32-bit stratum target to 64 bits
pub fn expand_compact_target(compact: u32) -> u64 {
    if compact == 0 {
        return 0;
    }
    u64::MAX / (u64::from(u32::MAX) / u64::from(compact))
}
