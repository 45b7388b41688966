// src/network/endpoint.rs
//! Pool endpoint table
//!
//! Endpoints are loaded once from configuration and never change. The table
//! is shared behind an `Arc`; connections refer to their endpoint by index.

use crate::utils::error::MinerError;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;
use url::Url;

/// Schemes that select a TLS connection
const TLS_SCHEMES: &[&str] = &["stratum+ssl", "stratum+tls", "ssl", "tls"];

/// Schemes that select a plain TCP connection
const TCP_SCHEMES: &[&str] = &["stratum+tcp", "stratum", "tcp"];

/// A single pool endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or IP literal
    pub host: String,
    /// Port, kept as text the way the resolver consumes it
    pub port: String,
    /// Wrap the TCP stream in TLS
    pub use_tls: bool,
}

impl Endpoint {
    /// Creates an endpoint from its parts
    pub fn new(host: impl Into<String>, port: impl Into<String>, use_tls: bool) -> Self {
        Endpoint {
            host: host.into(),
            port: port.into(),
            use_tls,
        }
    }

    /// Parses a pool URL such as `stratum+tcp://pool.example.com:3333`
    ///
    /// A bare `host:port` is accepted and treated as plain TCP.
    ///
    /// # Errors
    /// `ConfigError` when the scheme is unknown or the port is missing.
    pub fn parse(input: &str) -> Result<Self, MinerError> {
        let input = input.trim();
        let with_scheme = if input.contains("://") {
            input.to_string()
        } else {
            format!("stratum+tcp://{}", input)
        };
        let url = Url::parse(&with_scheme)?;

        let scheme = url.scheme();
        let use_tls = if TLS_SCHEMES.contains(&scheme) {
            true
        } else if TCP_SCHEMES.contains(&scheme) {
            false
        } else {
            return Err(MinerError::ConfigError(format!(
                "Unsupported pool scheme '{}' in '{}'",
                scheme, input
            )));
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| MinerError::ConfigError(format!("Missing host in '{}'", input)))?;
        let port = url
            .port()
            .ok_or_else(|| MinerError::ConfigError(format!("Missing port in '{}'", input)))?;

        // IPv6 literals come back bracketed
        let host = host.trim_start_matches('[').trim_end_matches(']');

        Ok(Endpoint::new(host, port.to_string(), use_tls))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.use_tls { "stratum+ssl" } else { "stratum+tcp" };
        write!(f, "{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Ordered, immutable list of endpoints; index 0 has the highest priority
#[derive(Debug, Clone)]
pub struct EndpointTable {
    endpoints: Arc<[Endpoint]>,
}

impl EndpointTable {
    /// Builds a table, rejecting an empty endpoint list
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self, MinerError> {
        if endpoints.is_empty() {
            return Err(MinerError::ConfigError(
                "At least one pool endpoint must be configured".into(),
            ));
        }
        Ok(EndpointTable {
            endpoints: endpoints.into(),
        })
    }

    /// Parses every URL in priority order
    pub fn from_urls<S: AsRef<str>>(urls: &[S]) -> Result<Self, MinerError> {
        let endpoints = urls
            .iter()
            .map(|u| Endpoint::parse(u.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(endpoints)
    }

    /// Number of endpoints
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false for a constructed table
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Endpoints in priority order
    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }
}

impl Index<usize> for EndpointTable {
    type Output = Endpoint;

    fn index(&self, index: usize) -> &Endpoint {
        &self.endpoints[index]
    }
}
