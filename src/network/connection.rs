// src/network/connection.rs
//! Per-endpoint pool connection
//!
//! [`PoolConnection`] is the reconnect state machine. Each transition returns
//! the next [`Action`] and never performs I/O itself; [`drive`] is the task
//! that executes those actions through a [`Transport`] and talks to the
//! owning connection pool over channels.

use crate::network::backoff::Backoff;
use crate::network::endpoint::{Endpoint, EndpointTable};
use crate::network::transport::{PoolStream, Transport};
use log::{debug, info, warn};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

/// Size of the buffer used for a single socket read
const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Lifecycle of one pool connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    /// No addresses, nothing in flight
    Unresolved,
    /// DNS lookup in flight
    Resolving,
    /// Lookup failed; waiting for the backoff timer
    ResolveFailed,
    /// Addresses known
    Resolved,
    /// TCP (and TLS) handshake in flight
    Connecting,
    /// Handshake to the current address failed
    ConnectFailed,
    /// Stream established
    Connected,
}

/// What the driver must do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Resolve the endpoint's host
    Resolve,
    /// Connect to this address
    Connect(SocketAddr),
    /// Sleep, then resolve again
    Wait(Duration),
    /// Stopped; do nothing until started again
    Idle,
}

/// Point-in-time view of a connection, published for observers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionStatus {
    /// Current state
    pub state: ConnectionState,
    /// Consecutive resolve failures since the last successful lookup
    pub failed_attempts: u64,
    /// Delay the next resolve retry will wait
    pub retry_delay: Duration,
    /// Number of resolved addresses held
    pub addresses: usize,
}

/// Reconnect state machine for a single endpoint
#[derive(Debug)]
pub struct PoolConnection {
    endpoints: EndpointTable,
    index: usize,
    state: ConnectionState,
    addresses: Vec<SocketAddr>,
    current_address: usize,
    backoff: Backoff,
    failed_attempts: u64,
}

impl PoolConnection {
    /// Creates an unresolved connection for `endpoints[index]`
    pub fn new(endpoints: EndpointTable, index: usize) -> Self {
        Self::with_backoff(endpoints, index, Backoff::default())
    }

    /// Creates a connection with a custom backoff policy
    pub fn with_backoff(endpoints: EndpointTable, index: usize, backoff: Backoff) -> Self {
        PoolConnection {
            endpoints,
            index,
            state: ConnectionState::Unresolved,
            addresses: Vec::new(),
            current_address: 0,
            backoff,
            failed_attempts: 0,
        }
    }

    /// Endpoint this connection targets
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoints[self.index]
    }

    /// Priority index in the endpoint table
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Snapshot for observers
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            failed_attempts: self.failed_attempts,
            retry_delay: self.backoff.current(),
            addresses: self.addresses.len(),
        }
    }

    /// Begins (or retries) resolution
    pub fn start(&mut self) -> Action {
        debug_assert!(
            matches!(
                self.state,
                ConnectionState::Unresolved | ConnectionState::ResolveFailed
            ),
            "start() from {:?}",
            self.state
        );
        self.state = ConnectionState::Resolving;
        debug!("Resolving {}", self.endpoint());
        Action::Resolve
    }

    /// Resolution finished with `addresses`; an empty list counts as failure
    pub fn on_resolved(&mut self, addresses: Vec<SocketAddr>) -> Action {
        if addresses.is_empty() {
            let err = io::Error::new(io::ErrorKind::NotFound, "no addresses returned");
            return self.on_resolve_failed(&err);
        }

        debug!(
            "Resolved {} to {} address(es)",
            self.endpoint(),
            addresses.len()
        );
        self.addresses = addresses;
        self.failed_attempts = 0;
        self.backoff.reset();
        self.state = ConnectionState::Resolved;

        self.current_address = 0;
        self.state = ConnectionState::Connecting;
        Action::Connect(self.addresses[0])
    }

    /// Resolution failed; wait the current backoff, grow the next one
    pub fn on_resolve_failed(&mut self, err: &io::Error) -> Action {
        self.failed_attempts += 1;
        self.state = ConnectionState::ResolveFailed;
        let delay = self.backoff.next_delay();
        warn!(
            "Failed to resolve {} (attempt {}): {}; retrying in {:.1}s",
            self.endpoint(),
            self.failed_attempts,
            err,
            delay.as_secs_f64()
        );
        Action::Wait(delay)
    }

    /// Handshake succeeded
    pub fn on_connected(&mut self) {
        self.state = ConnectionState::Connected;
        info!(
            "Connected to {} ({})",
            self.endpoint(),
            self.addresses[self.current_address]
        );
    }

    /// Handshake failed: try the next address now, or back off for the
    /// maximum delay once every address has been tried
    pub fn on_connect_failed(&mut self, err: &io::Error) -> Action {
        self.state = ConnectionState::ConnectFailed;
        warn!(
            "Failed to connect to {} ({}): {}",
            self.endpoint(),
            self.addresses[self.current_address],
            err
        );

        self.current_address += 1;
        if let Some(&next) = self.addresses.get(self.current_address) {
            self.state = ConnectionState::Connecting;
            return Action::Connect(next);
        }

        self.reset();
        let delay = self.backoff.max();
        warn!(
            "All addresses of {} failed; retrying in {:.0}s",
            self.endpoint(),
            delay.as_secs_f64()
        );
        Action::Wait(delay)
    }

    /// An established stream failed or was closed by the pool
    pub fn on_disconnected(&mut self) -> Action {
        self.reset();
        Action::Wait(self.backoff.current())
    }

    /// Explicit reset: drop everything and resolve again immediately
    pub fn on_reset(&mut self) -> Action {
        self.reset();
        self.start()
    }

    /// Stops the connection; safe from any state, any number of times
    pub fn stop(&mut self) -> Action {
        self.reset();
        Action::Idle
    }

    fn reset(&mut self) {
        self.addresses.clear();
        self.current_address = 0;
        self.state = ConnectionState::Unresolved;
    }
}

/// Instructions from the connection pool to a driver
#[derive(Debug)]
pub(crate) enum DriverCommand {
    /// This connection became active: forward inbound bytes
    StartReading,
    /// Another connection became active
    StopReading,
    /// Send bytes on the established stream
    Write(Vec<u8>),
    /// Close the stream and start over from resolution
    Reset,
    /// Close the stream and end the driver
    Stop,
}

/// Notifications from a driver to the connection pool
#[derive(Debug)]
pub(crate) enum DriverEvent {
    Connected(usize),
    Disconnected(usize),
    Data(usize, Vec<u8>),
}

/// How a connected session ended
enum SessionEnd {
    Closed,
    Failed(io::Error),
    Reset,
    Stopped,
    PoolGone,
}

/// Outcome of waiting on a resolve, connect or backoff timer
enum Interrupt<T> {
    Done(T),
    Reset,
    Stop,
}

/// Polls `work` while still serving pool commands
///
/// `Reset` and `Stop` abandon `work`; writes have no stream to go to and
/// are dropped.
async fn until_interrupted<F: Future>(
    work: F,
    commands: &mut mpsc::UnboundedReceiver<DriverCommand>,
    endpoint: &Endpoint,
) -> Interrupt<F::Output> {
    tokio::pin!(work);
    loop {
        tokio::select! {
            out = &mut work => return Interrupt::Done(out),
            cmd = commands.recv() => match cmd {
                None | Some(DriverCommand::Stop) => return Interrupt::Stop,
                Some(DriverCommand::Reset) => return Interrupt::Reset,
                Some(DriverCommand::Write(bytes)) => {
                    debug!("Dropping {} byte write for disconnected {}", bytes.len(), endpoint);
                }
                Some(DriverCommand::StartReading | DriverCommand::StopReading) => {}
            },
        }
    }
}

/// Discards commands left over from a previous session
///
/// A pending `Reset` or `Stop` still applies to the new stream.
fn take_stale(commands: &mut mpsc::UnboundedReceiver<DriverCommand>) -> Interrupt<()> {
    let mut pending = Interrupt::Done(());
    while let Ok(cmd) = commands.try_recv() {
        match cmd {
            DriverCommand::Stop => return Interrupt::Stop,
            DriverCommand::Reset => pending = Interrupt::Reset,
            _ => {}
        }
    }
    pending
}

/// Runs one connection until it is stopped or the pool goes away
pub(crate) async fn drive<T: Transport>(
    mut conn: PoolConnection,
    transport: Arc<T>,
    events: mpsc::UnboundedSender<DriverEvent>,
    mut commands: mpsc::UnboundedReceiver<DriverCommand>,
    status: watch::Sender<ConnectionStatus>,
) {
    let index = conn.index();
    let mut action = conn.start();

    loop {
        status.send_replace(conn.status());

        action = match action {
            Action::Resolve => {
                let endpoint = conn.endpoint();
                let lookup = transport.resolve(&endpoint.host, &endpoint.port);
                match until_interrupted(lookup, &mut commands, endpoint).await {
                    Interrupt::Done(Ok(addresses)) => conn.on_resolved(addresses),
                    Interrupt::Done(Err(e)) => conn.on_resolve_failed(&e),
                    Interrupt::Reset => conn.on_reset(),
                    Interrupt::Stop => conn.stop(),
                }
            }
            Action::Connect(addr) => {
                let endpoint = conn.endpoint();
                let connecting = transport.connect(addr, endpoint);
                match until_interrupted(connecting, &mut commands, endpoint).await {
                    Interrupt::Done(Ok(stream)) => {
                        conn.on_connected();
                        status.send_replace(conn.status());

                        match take_stale(&mut commands) {
                            Interrupt::Stop => conn.stop(),
                            Interrupt::Reset => {
                                info!("Resetting connection to {}", conn.endpoint());
                                conn.on_reset()
                            }
                            Interrupt::Done(()) => {
                                if events.send(DriverEvent::Connected(index)).is_err() {
                                    return;
                                }

                                let end = session(index, stream, &events, &mut commands).await;
                                let next = match end {
                                    SessionEnd::PoolGone => return,
                                    SessionEnd::Stopped => conn.stop(),
                                    SessionEnd::Reset => {
                                        info!("Resetting connection to {}", conn.endpoint());
                                        conn.on_reset()
                                    }
                                    SessionEnd::Closed => {
                                        warn!("Pool {} closed the connection", conn.endpoint());
                                        conn.on_disconnected()
                                    }
                                    SessionEnd::Failed(e) => {
                                        warn!("Connection to {} lost: {}", conn.endpoint(), e);
                                        conn.on_disconnected()
                                    }
                                };

                                if events.send(DriverEvent::Disconnected(index)).is_err() {
                                    return;
                                }
                                next
                            }
                        }
                    }
                    Interrupt::Done(Err(e)) => conn.on_connect_failed(&e),
                    Interrupt::Reset => conn.on_reset(),
                    Interrupt::Stop => conn.stop(),
                }
            }
            Action::Wait(delay) => {
                let backoff = tokio::time::sleep(delay);
                match until_interrupted(backoff, &mut commands, conn.endpoint()).await {
                    Interrupt::Done(()) => conn.start(),
                    Interrupt::Reset => conn.on_reset(),
                    Interrupt::Stop => conn.stop(),
                }
            }
            Action::Idle => {
                debug!("Connection to {} stopped", conn.endpoint());
                return;
            }
        };
    }
}

/// Pumps one established stream
async fn session(
    index: usize,
    stream: PoolStream,
    events: &mpsc::UnboundedSender<DriverEvent>,
    commands: &mut mpsc::UnboundedReceiver<DriverCommand>,
) -> SessionEnd {
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut reading = false;
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                None => return SessionEnd::PoolGone,
                Some(DriverCommand::StartReading) => reading = true,
                Some(DriverCommand::StopReading) => reading = false,
                Some(DriverCommand::Write(bytes)) => {
                    let written = async {
                        writer.write_all(&bytes).await?;
                        writer.flush().await
                    };
                    if let Err(e) = written.await {
                        return SessionEnd::Failed(e);
                    }
                }
                Some(DriverCommand::Reset) => return SessionEnd::Reset,
                Some(DriverCommand::Stop) => return SessionEnd::Stopped,
            },
            read = reader.read(&mut buf), if reading => match read {
                Ok(0) => return SessionEnd::Closed,
                Ok(n) => {
                    if events.send(DriverEvent::Data(index, buf[..n].to_vec())).is_err() {
                        return SessionEnd::PoolGone;
                    }
                }
                Err(e) => return SessionEnd::Failed(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::backoff::{INITIAL_DELAY, MAX_DELAY};

    fn connection() -> PoolConnection {
        let table = EndpointTable::new(vec![Endpoint::new("pool.test", "3333", false)]).unwrap();
        PoolConnection::new(table, 0)
    }

    fn addr(last: u8) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, last], 3333))
    }

    fn refused() -> io::Error {
        io::Error::new(io::ErrorKind::ConnectionRefused, "refused")
    }

    #[test]
    fn resolve_failures_back_off_exponentially() {
        let mut conn = connection();
        assert_eq!(conn.start(), Action::Resolve);

        let err = io::Error::new(io::ErrorKind::NotFound, "nxdomain");
        let mut expected = INITIAL_DELAY;
        for attempt in 1..=12u64 {
            assert_eq!(conn.on_resolve_failed(&err), Action::Wait(expected));
            assert_eq!(conn.state(), ConnectionState::ResolveFailed);
            assert_eq!(conn.status().failed_attempts, attempt);
            expected = expected.mul_f64(std::f64::consts::E).min(MAX_DELAY);
            assert_eq!(conn.start(), Action::Resolve);
        }
        assert_eq!(conn.status().retry_delay, MAX_DELAY);
    }

    #[test]
    fn resolve_success_resets_backoff_and_connects_first_address() {
        let mut conn = connection();
        conn.start();
        conn.on_resolve_failed(&refused());
        conn.start();

        let action = conn.on_resolved(vec![addr(1), addr(2)]);
        assert_eq!(action, Action::Connect(addr(1)));
        assert_eq!(conn.state(), ConnectionState::Connecting);
        let status = conn.status();
        assert_eq!(status.failed_attempts, 0);
        assert_eq!(status.retry_delay, INITIAL_DELAY);
        assert_eq!(status.addresses, 2);
    }

    #[test]
    fn empty_resolution_counts_as_failure() {
        let mut conn = connection();
        conn.start();
        assert_eq!(conn.on_resolved(Vec::new()), Action::Wait(INITIAL_DELAY));
        assert_eq!(conn.status().failed_attempts, 1);
    }

    #[test]
    fn connect_failure_advances_then_waits_max_delay() {
        let mut conn = connection();
        conn.start();
        conn.on_resolved(vec![addr(1), addr(2), addr(3)]);

        assert_eq!(conn.on_connect_failed(&refused()), Action::Connect(addr(2)));
        assert_eq!(conn.on_connect_failed(&refused()), Action::Connect(addr(3)));
        assert_eq!(conn.on_connect_failed(&refused()), Action::Wait(MAX_DELAY));

        assert_eq!(conn.state(), ConnectionState::Unresolved);
        assert_eq!(conn.status().addresses, 0);
        assert_eq!(conn.start(), Action::Resolve);
    }

    #[test]
    fn disconnect_returns_to_unresolved() {
        let mut conn = connection();
        conn.start();
        conn.on_resolved(vec![addr(1)]);
        conn.on_connected();
        assert_eq!(conn.state(), ConnectionState::Connected);

        assert_eq!(conn.on_disconnected(), Action::Wait(INITIAL_DELAY));
        assert_eq!(conn.state(), ConnectionState::Unresolved);
    }

    #[test]
    fn stop_is_idempotent_from_any_state() {
        let mut conn = connection();
        assert_eq!(conn.stop(), Action::Idle);
        assert_eq!(conn.stop(), Action::Idle);

        conn.start();
        conn.on_resolved(vec![addr(1)]);
        conn.on_connected();
        assert_eq!(conn.stop(), Action::Idle);
        assert_eq!(conn.stop(), Action::Idle);
        assert_eq!(conn.state(), ConnectionState::Unresolved);
        assert_eq!(conn.status().addresses, 0);
    }
}
