// src/utils/error.rs
use std::io;
use thiserror::Error;

/// Main error type for the mining client
///
/// Steady-state failures (DNS, connect, write, a single backend call) are
/// logged and retried where they happen; only construction-time failures
/// are returned to callers through this type.
#[derive(Error, Debug)]
pub enum MinerError {
    /// Errors related to hashing algorithms (e.g., unsupported variant)
    #[error("Algorithm error: {0}")]
    AlgorithmError(String),

    /// Errors related to network connectivity
    #[error("Network connection error: {0}")]
    ConnectionError(String),

    /// A write was attempted while no pool connection is active
    #[error("No active pool connection")]
    NotConnected,

    /// Errors in protocol handling or invalid protocol messages
    #[error("Protocol violation: {0}")]
    ProtocolError(String),

    /// Standard I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    /// Configuration file or parameter errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid job input (oversized blob, unparsable target)
    #[error("Invalid input: {0}")]
    InputError(String),

    /// Solver backend device or context failures
    #[error("Device error: {0}")]
    DeviceError(String),
}

/// Converts hex decoding errors into MinerError
///
/// Hex appears in job blobs and targets sent by the pool, so a bad digit is
/// treated as malformed input.
impl From<hex::FromHexError> for MinerError {
    fn from(e: hex::FromHexError) -> Self {
        MinerError::InputError(format!("Hex conversion failed: {}", e))
    }
}
