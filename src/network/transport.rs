// src/network/transport.rs
//! Socket primitives used by pool connections
//!
//! Pool connections never touch sockets directly; they go through a
//! [`Transport`] so the reconnect policy can run against an in-memory
//! transport in tests.

use crate::network::endpoint::Endpoint;
use crate::utils::error::MinerError;
use futures::future::BoxFuture;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, lookup_host};
use tokio_native_tls::{TlsConnector, native_tls};

/// Byte stream to a pool, plain or TLS
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

/// Boxed stream handed to a connection driver
pub type PoolStream = Box<dyn AsyncStream>;

/// DNS resolution and connection establishment
pub trait Transport: Send + Sync + 'static {
    /// Resolves `host:port` to an ordered address list
    fn resolve(&self, host: &str, port: &str) -> BoxFuture<'static, io::Result<Vec<SocketAddr>>>;

    /// Opens a stream to one resolved address of `endpoint`
    fn connect(
        &self,
        addr: SocketAddr,
        endpoint: &Endpoint,
    ) -> BoxFuture<'static, io::Result<PoolStream>>;
}

/// Tokio TCP transport with optional TLS
#[derive(Clone)]
pub struct TcpTransport {
    tls: TlsConnector,
}

impl TcpTransport {
    /// Creates the transport
    ///
    /// # Errors
    /// Returns `ConnectionError` if the platform TLS backend cannot be
    /// initialized.
    pub fn new() -> Result<Self, MinerError> {
        let connector = native_tls::TlsConnector::builder()
            .build()
            .map_err(|e| MinerError::ConnectionError(format!("TLS init failed: {}", e)))?;
        Ok(TcpTransport {
            tls: TlsConnector::from(connector),
        })
    }
}

impl Transport for TcpTransport {
    fn resolve(&self, host: &str, port: &str) -> BoxFuture<'static, io::Result<Vec<SocketAddr>>> {
        let target = format!("{}:{}", host, port);
        Box::pin(async move {
            let addrs: Vec<SocketAddr> = lookup_host(target).await?.collect();
            Ok(addrs)
        })
    }

    fn connect(
        &self,
        addr: SocketAddr,
        endpoint: &Endpoint,
    ) -> BoxFuture<'static, io::Result<PoolStream>> {
        let tls = endpoint.use_tls.then(|| self.tls.clone());
        let domain = endpoint.host.clone();
        Box::pin(async move {
            let stream = TcpStream::connect(addr).await?;
            stream.set_nodelay(true)?; // Disable Nagle's algorithm for low latency

            match tls {
                Some(connector) => {
                    let tls_stream = connector
                        .connect(&domain, stream)
                        .await
                        .map_err(|e| io::Error::other(format!("TLS handshake failed: {}", e)))?;
                    Ok(Box::new(tls_stream) as PoolStream)
                }
                None => Ok(Box::new(stream) as PoolStream),
            }
        })
    }
}
