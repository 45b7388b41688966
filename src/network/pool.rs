// src/network/pool.rs

//! Connection pool with priority failover
//!
//! Owns one driver task per endpoint and elects the *active* connection:
//! always the lowest-index endpoint that is currently connected. Only the
//! active connection is read from and written to.
use crate::network::connection::{
    ConnectionState, ConnectionStatus, DriverCommand, DriverEvent, PoolConnection, drive,
};
use crate::network::endpoint::EndpointTable;
use crate::network::transport::Transport;
use crate::utils::error::MinerError;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Events emitted to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A (new) active connection was elected
    Connected,
    /// Bytes received on the active connection
    Data(Vec<u8>),
    /// The last connected endpoint went away; nothing is active
    Disconnected,
}

/// Runtime handle of one endpoint's driver
struct Link {
    commands: mpsc::UnboundedSender<DriverCommand>,
    status: watch::Receiver<ConnectionStatus>,
    connected: bool,
}

/// Owns all pool connections and multiplexes them into one event stream
pub struct ConnectionPool<T: Transport> {
    endpoints: EndpointTable,
    transport: Arc<T>,
    links: Vec<Link>,
    active: Option<usize>,
    events_tx: mpsc::UnboundedSender<DriverEvent>,
    events_rx: mpsc::UnboundedReceiver<DriverEvent>,
    stopped: bool,
}

impl<T: Transport> ConnectionPool<T> {
    /// Creates a pool for `endpoints`
    ///
    /// # Errors
    /// `ConfigError` if the endpoint table is empty.
    pub fn new(endpoints: EndpointTable, transport: T) -> Result<Self, MinerError> {
        if endpoints.is_empty() {
            return Err(MinerError::ConfigError("No pool endpoints configured".into()));
        }
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(ConnectionPool {
            endpoints,
            transport: Arc::new(transport),
            links: Vec::new(),
            active: None,
            events_tx,
            events_rx,
            stopped: false,
        })
    }

    /// Spawns a driver for every endpoint
    ///
    /// Must be called from within a tokio runtime, once.
    pub fn start(&mut self) {
        assert!(
            self.links.is_empty() && !self.stopped,
            "connection pool started twice"
        );

        for index in 0..self.endpoints.len() {
            let conn = PoolConnection::new(self.endpoints.clone(), index);
            let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
            let (status_tx, status_rx) = watch::channel(conn.status());

            tokio::spawn(drive(
                conn,
                Arc::clone(&self.transport),
                self.events_tx.clone(),
                cmd_rx,
                status_tx,
            ));

            self.links.push(Link {
                commands: cmd_tx,
                status: status_rx,
                connected: false,
            });
        }
        info!("Started {} pool connection(s)", self.links.len());
    }

    /// Waits for the next event for the orchestrator
    ///
    /// Returns `None` once the pool has been stopped. Cancel-safe.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        loop {
            if self.stopped {
                return None;
            }
            let event = self.events_rx.recv().await?;
            if let Some(upward) = self.handle(event) {
                return Some(upward);
            }
        }
    }

    /// Sends bytes on the active connection
    ///
    /// # Errors
    /// `NotConnected` when no connection is active.
    pub fn write(&self, bytes: Vec<u8>) -> Result<(), MinerError> {
        let index = self.active.ok_or(MinerError::NotConnected)?;
        self.links[index]
            .commands
            .send(DriverCommand::Write(bytes))
            .map_err(|_| MinerError::NotConnected)
    }

    /// Index of the active connection, if any
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// Latest published status of connection `index`
    pub fn status(&self, index: usize) -> Option<ConnectionStatus> {
        self.links.get(index).map(|link| *link.status.borrow())
    }

    /// Endpoint table this pool was built from
    pub fn endpoints(&self) -> &EndpointTable {
        &self.endpoints
    }

    /// Forces connection `index` back through resolution
    pub fn reset(&self, index: usize) {
        if let Some(link) = self.links.get(index) {
            let _ = link.commands.send(DriverCommand::Reset);
        }
    }

    /// Stops every connection and ends the event stream
    ///
    /// Drivers close their streams and exit on their own; their last
    /// status stays readable. Safe to call any number of times.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        for link in &mut self.links {
            let _ = link.commands.send(DriverCommand::Stop);
            link.connected = false;
        }
        self.active = None;
        while self.events_rx.try_recv().is_ok() {}
        info!("Connection pool stopped");
    }

    fn handle(&mut self, event: DriverEvent) -> Option<ConnectionEvent> {
        match event {
            DriverEvent::Connected(index) => {
                self.links[index].connected = true;
                self.elect()
            }
            DriverEvent::Disconnected(index) => {
                self.links[index].connected = false;
                self.elect()
            }
            DriverEvent::Data(index, bytes) => {
                if self.active == Some(index) && !bytes.is_empty() {
                    Some(ConnectionEvent::Data(bytes))
                } else {
                    debug!(
                        "Ignoring {} bytes from inactive connection {}",
                        bytes.len(),
                        index
                    );
                    None
                }
            }
        }
    }

    /// Picks the lowest-index connected link and switches reading to it
    fn elect(&mut self) -> Option<ConnectionEvent> {
        let elected = self.links.iter().position(|link| link.connected);
        if elected == self.active {
            return None;
        }

        if let Some(old) = self.active {
            let _ = self.links[old].commands.send(DriverCommand::StopReading);
        }
        self.active = elected;

        match elected {
            Some(index) => {
                let _ = self.links[index].commands.send(DriverCommand::StartReading);
                info!("Active pool is now {}", self.endpoints[index]);
                Some(ConnectionEvent::Connected)
            }
            None => {
                warn!("No pool connection available");
                Some(ConnectionEvent::Disconnected)
            }
        }
    }

    /// True when connection `index` reports `Connected`
    pub fn is_connected(&self, index: usize) -> bool {
        self.status(index)
            .is_some_and(|s| s.state == ConnectionState::Connected)
    }
}

impl<T: Transport> Drop for ConnectionPool<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
