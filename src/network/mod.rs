// src/network/mod.rs
//! Network communication components
//!
//! Resilient connections to mining pools:
//! - `EndpointTable`: configured pools in priority order
//! - `PoolConnection`: per-endpoint resolve/connect state machine with backoff
//! - `ConnectionPool`: failover across connections, one active stream

/// Capped exponential backoff
pub mod backoff;

/// Per-endpoint reconnect state machine and its driver task
pub mod connection;

/// Pool endpoints parsed from configuration
pub mod endpoint;

/// Priority-ordered connection pool
pub mod pool;

/// DNS and socket primitives (TCP, TLS)
pub mod transport;

// Re-export main components for cleaner imports
pub use connection::{ConnectionState, ConnectionStatus, PoolConnection};
pub use endpoint::{Endpoint, EndpointTable};
pub use pool::{ConnectionEvent, ConnectionPool};
pub use transport::{AsyncStream, PoolStream, TcpTransport, Transport};
