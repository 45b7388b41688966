// src/protocol/mod.rs
//! Pool wire protocol
//!
//! Only the stratum dialect spoken by CryptoNote pools is implemented.

/// Stratum JSON-RPC codec
pub mod stratum;

pub use stratum::{PoolJob, PoolMessage, StratumSession};
