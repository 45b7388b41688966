// tests/failover.rs
//! Connection pool behaviour against an in-memory transport
//!
//! Time is paused, so backoff delays elapse instantly while the driver
//! tasks still observe them in order.

use cn_miner_rs::MinerError;
use cn_miner_rs::network::backoff::{INITIAL_DELAY, MAX_DELAY};
use cn_miner_rs::network::{
    ConnectionEvent, ConnectionPool, ConnectionState, Endpoint, EndpointTable, PoolStream,
    Transport,
};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Scripted resolver and connector
///
/// Every accepted connection hands its server half to the test through
/// `servers`, tagged with the host it was opened for.
#[derive(Clone)]
struct FakeTransport {
    resolve_failures: Arc<Mutex<HashMap<String, u32>>>,
    addresses: Arc<Mutex<HashMap<String, Vec<SocketAddr>>>>,
    refused: Arc<Mutex<Vec<String>>>,
    connect_delay: Arc<Mutex<Duration>>,
    resolves: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
    servers: mpsc::UnboundedSender<(String, DuplexStream)>,
}

impl FakeTransport {
    fn new() -> (Self, mpsc::UnboundedReceiver<(String, DuplexStream)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = FakeTransport {
            resolve_failures: Arc::default(),
            addresses: Arc::default(),
            refused: Arc::default(),
            connect_delay: Arc::default(),
            resolves: Arc::default(),
            connects: Arc::default(),
            servers: tx,
        };
        (transport, rx)
    }

    fn host(&self, host: &str, addrs: &[[u8; 4]]) -> &Self {
        let addrs = addrs.iter().map(|ip| SocketAddr::from((*ip, 3333))).collect();
        self.addresses.lock().unwrap().insert(host.to_string(), addrs);
        self
    }

    fn fail_resolves(&self, host: &str, times: u32) -> &Self {
        self.resolve_failures.lock().unwrap().insert(host.to_string(), times);
        self
    }

    fn refuse(&self, host: &str) -> &Self {
        self.refused.lock().unwrap().push(host.to_string());
        self
    }

    fn slow_connects(&self, delay: Duration) -> &Self {
        *self.connect_delay.lock().unwrap() = delay;
        self
    }
}

impl Transport for FakeTransport {
    fn resolve(&self, host: &str, _port: &str) -> BoxFuture<'static, io::Result<Vec<SocketAddr>>> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        let result = {
            let mut failures = self.resolve_failures.lock().unwrap();
            match failures.get_mut(host) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    Err(io::Error::new(io::ErrorKind::NotFound, "nxdomain"))
                }
                _ => Ok(self
                    .addresses
                    .lock()
                    .unwrap()
                    .get(host)
                    .cloned()
                    .unwrap_or_default()),
            }
        };
        Box::pin(async move { result })
    }

    fn connect(
        &self,
        _addr: SocketAddr,
        endpoint: &Endpoint,
    ) -> BoxFuture<'static, io::Result<PoolStream>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let host = endpoint.host.clone();
        let refused = self.refused.lock().unwrap().contains(&host);
        let servers = self.servers.clone();
        let delay = *self.connect_delay.lock().unwrap();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            if refused {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
            }
            let (client, server) = tokio::io::duplex(4096);
            let _ = servers.send((host, server));
            Ok(Box::new(client) as PoolStream)
        })
    }
}

fn table(hosts: &[&str]) -> EndpointTable {
    EndpointTable::new(hosts.iter().map(|h| Endpoint::new(*h, "3333", false)).collect()).unwrap()
}

async fn read_some(server: &mut DuplexStream) -> Vec<u8> {
    let mut buf = vec![0u8; 256];
    let n = server.read(&mut buf).await.unwrap();
    buf.truncate(n);
    buf
}

#[tokio::test(start_paused = true)]
async fn primary_takes_over_once_it_resolves_and_wins_back_after_failure() {
    let (transport, mut servers) = FakeTransport::new();
    transport
        .host("primary", &[[10, 0, 0, 1]])
        .host("backup", &[[10, 0, 0, 2]])
        .fail_resolves("primary", 3);

    let started = Instant::now();
    let mut pool = ConnectionPool::new(table(&["primary", "backup"]), transport).unwrap();
    pool.start();

    // The backup answers first
    assert_eq!(pool.next_event().await, Some(ConnectionEvent::Connected));
    assert_eq!(pool.active(), Some(1));
    let (host, mut backup) = servers.recv().await.unwrap();
    assert_eq!(host, "backup");

    // Primary comes up after three backed-off resolve failures: 1s + e s + e^2 s
    assert_eq!(pool.next_event().await, Some(ConnectionEvent::Connected));
    assert_eq!(pool.active(), Some(0));
    assert!(started.elapsed() >= Duration::from_secs(11));
    let (host, mut primary) = servers.recv().await.unwrap();
    assert_eq!(host, "primary");

    let status = pool.status(0).unwrap();
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(status.failed_attempts, 0);
    assert_eq!(status.retry_delay, INITIAL_DELAY);
    assert!(pool.is_connected(1));

    // Writes go to the active connection only
    pool.write(b"login\n".to_vec()).unwrap();
    assert_eq!(read_some(&mut primary).await, b"login\n");

    primary.write_all(b"job\n").await.unwrap();
    assert_eq!(pool.next_event().await, Some(ConnectionEvent::Data(b"job\n".to_vec())));

    // Primary drops: the backup becomes active again
    let lost = Instant::now();
    drop(primary);
    assert_eq!(pool.next_event().await, Some(ConnectionEvent::Connected));
    assert_eq!(pool.active(), Some(1));

    pool.write(b"submit\n".to_vec()).unwrap();
    assert_eq!(read_some(&mut backup).await, b"submit\n");

    // ...and primary reclaims priority after one initial delay
    assert_eq!(pool.next_event().await, Some(ConnectionEvent::Connected));
    assert_eq!(pool.active(), Some(0));
    assert!(lost.elapsed() >= INITIAL_DELAY);
    let (host, _primary) = servers.recv().await.unwrap();
    assert_eq!(host, "primary");

    pool.stop();
}

#[tokio::test(start_paused = true)]
async fn losing_the_only_connection_reports_disconnected() {
    let (transport, mut servers) = FakeTransport::new();
    transport.host("solo", &[[10, 0, 0, 9]]);

    let mut pool = ConnectionPool::new(table(&["solo"]), transport).unwrap();
    pool.start();

    assert_eq!(pool.next_event().await, Some(ConnectionEvent::Connected));
    let (_, server) = servers.recv().await.unwrap();

    drop(server);
    assert_eq!(pool.next_event().await, Some(ConnectionEvent::Disconnected));
    assert_eq!(pool.active(), None);
    assert!(matches!(pool.write(b"x".to_vec()), Err(MinerError::NotConnected)));

    // The driver reconnects on its own
    assert_eq!(pool.next_event().await, Some(ConnectionEvent::Connected));
    assert_eq!(pool.active(), Some(0));
}

#[tokio::test(start_paused = true)]
async fn reset_forces_a_fresh_connection() {
    let (transport, mut servers) = FakeTransport::new();
    transport.host("solo", &[[10, 0, 0, 9]]);
    let resolves = Arc::clone(&transport.resolves);

    let mut pool = ConnectionPool::new(table(&["solo"]), transport).unwrap();
    pool.start();
    assert_eq!(pool.next_event().await, Some(ConnectionEvent::Connected));
    let (_, _first) = servers.recv().await.unwrap();
    assert_eq!(resolves.load(Ordering::SeqCst), 1);

    pool.reset(0);
    assert_eq!(pool.next_event().await, Some(ConnectionEvent::Disconnected));
    assert_eq!(pool.next_event().await, Some(ConnectionEvent::Connected));
    let (_, _second) = servers.recv().await.unwrap();
    assert_eq!(resolves.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_addresses_wait_the_maximum_delay() {
    let (transport, _servers) = FakeTransport::new();
    transport
        .host("dead", &[[10, 0, 0, 1], [10, 0, 0, 2]])
        .refuse("dead");
    let connects = Arc::clone(&transport.connects);
    let resolves = Arc::clone(&transport.resolves);

    let mut pool = ConnectionPool::new(table(&["dead"]), transport).unwrap();
    pool.start();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(resolves.load(Ordering::SeqCst), 1);
    assert_eq!(connects.load(Ordering::SeqCst), 2);
    assert_eq!(pool.active(), None);

    tokio::time::sleep(MAX_DELAY - Duration::from_secs(2)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(resolves.load(Ordering::SeqCst), 2);
    assert_eq!(connects.load(Ordering::SeqCst), 4);

    // Connect failures never count as resolve failures
    assert_eq!(pool.status(0).unwrap().failed_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_ends_the_event_stream() {
    let (transport, _servers) = FakeTransport::new();
    transport.host("solo", &[[10, 0, 0, 9]]);

    let mut pool = ConnectionPool::new(table(&["solo"]), transport).unwrap();
    pool.start();
    assert_eq!(pool.next_event().await, Some(ConnectionEvent::Connected));

    pool.stop();
    pool.stop();
    assert_eq!(pool.active(), None);
    assert_eq!(pool.next_event().await, None);
    assert!(pool.write(b"late".to_vec()).is_err());
}

#[tokio::test(start_paused = true)]
async fn reset_during_a_slow_connect_starts_over() {
    let (transport, mut servers) = FakeTransport::new();
    transport
        .host("solo", &[[10, 0, 0, 9]])
        .slow_connects(Duration::from_secs(5));
    let resolves = Arc::clone(&transport.resolves);
    let connects = Arc::clone(&transport.connects);

    let started = Instant::now();
    let mut pool = ConnectionPool::new(table(&["solo"]), transport).unwrap();
    pool.start();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 1);
    pool.reset(0);

    // The first attempt is abandoned; the second resolves afresh
    assert_eq!(pool.next_event().await, Some(ConnectionEvent::Connected));
    assert!(started.elapsed() >= Duration::from_secs(6));
    assert_eq!(resolves.load(Ordering::SeqCst), 2);
    assert_eq!(connects.load(Ordering::SeqCst), 2);

    let (_, _server) = servers.recv().await.unwrap();
    assert!(servers.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn stop_closes_streams_and_parks_every_driver() {
    let (transport, mut servers) = FakeTransport::new();
    transport
        .host("primary", &[[10, 0, 0, 1]])
        .host("dead", &[[10, 0, 0, 2]])
        .refuse("dead");
    let resolves = Arc::clone(&transport.resolves);

    let mut pool = ConnectionPool::new(table(&["primary", "dead"]), transport).unwrap();
    pool.start();
    assert_eq!(pool.next_event().await, Some(ConnectionEvent::Connected));
    let (_, mut primary) = servers.recv().await.unwrap();

    pool.stop();

    // The connected driver hangs up; the backing-off one gives up its timer
    assert!(read_some(&mut primary).await.is_empty());
    tokio::time::sleep(MAX_DELAY * 2).await;
    let after = resolves.load(Ordering::SeqCst);
    tokio::time::sleep(MAX_DELAY * 2).await;
    assert_eq!(resolves.load(Ordering::SeqCst), after);

    for index in 0..2 {
        let status = pool.status(index).unwrap();
        assert_eq!(status.state, ConnectionState::Unresolved);
        assert_eq!(status.addresses, 0);
    }
}
