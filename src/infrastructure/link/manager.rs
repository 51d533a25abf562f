//! Connection Manager
//!
//! Owns the one outbound stream connection: pairing gate, socket open,
//! readiness, teardown and explicit reconnects. Driven from the control
//! context; the bridge only reads readiness and writes frames through
//! [`FrameLink`].

use crate::domain::models::{AppEvent, ConnectionStatus, MessageSeverity, StatusMessage};
use crate::error::{ConnectionError, WriteError};
use crate::infrastructure::bridge::FrameLink;
use crate::infrastructure::link::{
    connection::{ConnectOptions, Connector, StreamConnection},
    discovery::{await_pairing, PairingGate, PairingOutcome},
    protocol::Frame,
};
use std::sync::{Arc, Mutex, RwLock, TryLockError};
use tokio::sync::mpsc;
use tracing::{error, info, trace};

pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    gate: Arc<dyn PairingGate>,
    current: RwLock<Option<Arc<StreamConnection>>>,
    last_request: Mutex<Option<(String, ConnectOptions)>>,
    event_sender: Option<mpsc::UnboundedSender<AppEvent>>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, gate: Arc<dyn PairingGate>) -> Self {
        Self {
            connector,
            gate,
            current: RwLock::new(None),
            last_request: Mutex::new(None),
            event_sender: None,
        }
    }

    /// Publish status changes and user-facing messages on `sender`.
    pub fn with_event_sender(mut self, sender: mpsc::UnboundedSender<AppEvent>) -> Self {
        self.event_sender = Some(sender);
        self
    }

    /// Connect to `peer`, replacing any existing connection.
    ///
    /// Failures come back to the caller and are announced once; nothing is
    /// retried here.
    pub async fn connect(
        &self,
        peer: &str,
        options: &ConnectOptions,
    ) -> Result<Arc<StreamConnection>, ConnectionError> {
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some((peer.to_string(), options.clone()));
        }

        self.close_current();
        info!("Connecting to peer {} via {}", peer, self.connector.name());
        self.send_status(ConnectionStatus::Connecting);

        match self.establish(peer, options).await {
            Ok(conn) => {
                let displaced = match self.current.write() {
                    Ok(mut current) => current.replace(conn.clone()),
                    Err(poisoned) => poisoned.into_inner().replace(conn.clone()),
                };
                // Overlapping connects: the last one to finish owns the slot
                if let Some(old) = displaced {
                    info!("Closing superseded connection to {}", old.peer());
                    old.close();
                }
                info!("Connected to {} ({} socket)", peer, conn.mode());
                self.send_log(&format!("Connected to {}", peer), MessageSeverity::Success);
                self.send_status(ConnectionStatus::Connected);
                Ok(conn)
            }
            Err(ConnectionError::DiscoveryOnly(p)) => {
                info!("Discovery-only: {} approved, not opening a socket", p);
                self.send_log(&format!("Discovered {}", p), MessageSeverity::Info);
                self.send_status(ConnectionStatus::Disconnected);
                Err(ConnectionError::DiscoveryOnly(p))
            }
            Err(e) => {
                error!("Connection to {} failed: {}", peer, e);
                self.send_log(&format!("Connection failed: {}", e), MessageSeverity::Error);
                self.send_status(ConnectionStatus::Error);
                Err(e)
            }
        }
    }

    /// Connect again to the last requested peer with the same options.
    pub async fn reconnect(&self) -> Result<Arc<StreamConnection>, ConnectionError> {
        let last = self
            .last_request
            .lock()
            .ok()
            .and_then(|last| last.clone());
        match last {
            Some((peer, options)) => self.connect(&peer, &options).await,
            None => Err(ConnectionError::InvalidConfig(
                "no previous connection to reconnect".into(),
            )),
        }
    }

    async fn establish(
        &self,
        peer: &str,
        options: &ConnectOptions,
    ) -> Result<Arc<StreamConnection>, ConnectionError> {
        match await_pairing(self.gate.request(peer, options.service_uuid)).await {
            PairingOutcome::Approved => {}
            PairingOutcome::Rejected => return Err(ConnectionError::PairingRejected(peer.into())),
            PairingOutcome::Cancelled => {
                return Err(ConnectionError::PairingCancelled(peer.into()))
            }
        }

        if options.discover_only {
            return Err(ConnectionError::DiscoveryOnly(peer.into()));
        }

        let mode = options.socket_mode()?;
        let connector = self.connector.clone();
        let peer = peer.to_string();

        tokio::task::spawn_blocking(move || -> Result<Arc<StreamConnection>, ConnectionError> {
            let sink = connector.open(&peer, mode)?;
            // Dropped (and so closed) if the handshake fails
            let conn = StreamConnection::new(peer, mode, sink);
            conn.complete_handshake()
                .map_err(ConnectionError::Handshake)?;
            Ok(Arc::new(conn))
        })
        .await
        .map_err(|e| ConnectionError::Worker(e.to_string()))?
    }

    fn close_current(&self) -> bool {
        let previous = match self.current.write() {
            Ok(mut current) => current.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match previous {
            Some(conn) => {
                conn.close();
                true
            }
            None => false,
        }
    }

    /// Tear down the current connection. Idempotent.
    pub fn close(&self) {
        if self.close_current() {
            self.send_status(ConnectionStatus::Disconnected);
        }
    }

    /// Current connection, if any. Never blocks; a contended slot reads as none.
    pub fn current(&self) -> Option<Arc<StreamConnection>> {
        match self.current.try_read() {
            Ok(current) => current.clone(),
            Err(TryLockError::WouldBlock) => None,
            Err(TryLockError::Poisoned(_)) => None,
        }
    }

    pub fn peer(&self) -> Option<String> {
        self.current().map(|c| c.peer().to_string())
    }

    pub fn is_ready(&self) -> bool {
        self.current().map(|c| c.is_ready()).unwrap_or(false)
    }

    /// A write has failed on the current connection since it was opened.
    pub fn is_faulted(&self) -> bool {
        self.current().map(|c| c.is_faulted()).unwrap_or(false)
    }

    pub fn status(&self) -> ConnectionStatus {
        match self.current() {
            Some(c) if c.is_faulted() => ConnectionStatus::Error,
            Some(c) if c.is_ready() => ConnectionStatus::Connected,
            _ => ConnectionStatus::Disconnected,
        }
    }

    fn send_status(&self, status: ConnectionStatus) {
        if let Some(sender) = &self.event_sender {
            let _ = sender.send(AppEvent::ConnectionStatus(status));
        }
    }

    fn send_log(&self, message: &str, severity: MessageSeverity) {
        if let Some(sender) = &self.event_sender {
            let _ = sender.send(AppEvent::LogMessage(StatusMessage::new(message, severity)));
        }
    }
}

impl FrameLink for ConnectionManager {
    fn is_ready(&self) -> bool {
        ConnectionManager::is_ready(self)
    }

    fn send_frame(&self, frame: &Frame) -> Result<(), WriteError> {
        let conn = self.current().ok_or(WriteError::NotReady)?;
        trace!("Sending frame to {}", conn.peer());
        conn.send(frame.as_bytes())
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close_current();
    }
}
