// src/utils/mod.rs
//! Utilities module for common functionality
//!
//! Error handling and logging infrastructure shared by every subsystem.

/// Error types and handling utilities
///
/// Contains the [`MinerError`] enum which defines every error condition
/// surfaced to callers, along with conversion implementations.
pub mod error;

/// Logging configuration and utilities
pub mod logging;

// Re-export for easier access
pub use error::MinerError;
pub use logging::init_logging;
