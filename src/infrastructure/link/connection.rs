//! Stream Connection Module
//!
//! Opens byte-stream sockets to a peer and wraps them in a
//! [`StreamConnection`] with an observable readiness state.

use crate::domain::models::DEFAULT_SERVICE_UUID;
use crate::domain::settings::LinkSettings;
use crate::error::{ConnectionError, WriteError};
use interprocess::local_socket::{
    traits::Stream as _, GenericFilePath, GenericNamespaced, NameType, Stream as LocalStream,
    ToFsName, ToNsName,
};
use std::fmt;
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, TryLockError};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Writable half of an open socket.
pub type ByteSink = Box<dyn Write + Send>;

pub use crate::domain::models::Transport;

/// Authenticated or plain socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketMode {
    Secure,
    Insecure,
}

impl SocketMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secure => "secure",
            Self::Insecure => "insecure",
        }
    }
}

impl fmt::Display for SocketMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a single connect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Use an authenticated/encrypted socket
    pub secure: bool,
    /// Use a plain socket
    pub insecure: bool,
    /// Run discovery/pairing only, never open a socket
    pub discover_only: bool,
    /// Service the peer must expose
    pub service_uuid: Uuid,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            secure: false,
            insecure: true,
            discover_only: false,
            service_uuid: DEFAULT_SERVICE_UUID,
        }
    }
}

impl From<&LinkSettings> for ConnectOptions {
    fn from(link: &LinkSettings) -> Self {
        Self {
            secure: link.secure,
            insecure: link.insecure,
            discover_only: link.discover_only,
            service_uuid: link.service_uuid,
        }
    }
}

impl ConnectOptions {
    /// Pick the one socket mode to open. Secure wins when both are set.
    pub fn socket_mode(&self) -> Result<SocketMode, ConnectionError> {
        match (self.secure, self.insecure) {
            (true, _) => Ok(SocketMode::Secure),
            (false, true) => Ok(SocketMode::Insecure),
            (false, false) => Err(ConnectionError::NoSocketMode),
        }
    }
}

/// Opens a raw byte sink to a peer.
pub trait Connector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Blocking; called off the async runtime.
    fn open(&self, peer: &str, mode: SocketMode) -> Result<ByteSink, ConnectionError>;
}

/// Plain TCP sockets.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    pub connect_timeout: Duration,
    pub write_timeout: Option<Duration>,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            write_timeout: None,
        }
    }
}

impl Connector for TcpConnector {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn open(&self, peer: &str, mode: SocketMode) -> Result<ByteSink, ConnectionError> {
        if mode == SocketMode::Secure {
            return Err(ConnectionError::TransportUnsupported {
                transport: self.name(),
                mode: mode.as_str(),
            });
        }

        let addrs: Vec<_> = peer
            .to_socket_addrs()
            .map_err(|e| ConnectionError::InvalidConfig(format!("bad address {peer}: {e}")))?
            .collect();

        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no addresses resolved");
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    // Frames are tiny; flush must put them on the wire now
                    stream.set_nodelay(true).map_err(ConnectionError::Handshake)?;
                    stream
                        .set_write_timeout(self.write_timeout)
                        .map_err(ConnectionError::Handshake)?;
                    debug!("TCP socket open to {}", addr);
                    return Ok(Box::new(stream));
                }
                Err(e) => {
                    debug!("TCP connect to {} failed: {}", addr, e);
                    last_err = e;
                }
            }
        }
        Err(ConnectionError::Unreachable(last_err))
    }
}

/// Host-local sockets (Unix domain sockets / named pipes).
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSocketConnector;

impl Connector for LocalSocketConnector {
    fn name(&self) -> &'static str {
        "local_socket"
    }

    fn open(&self, peer: &str, _mode: SocketMode) -> Result<ByteSink, ConnectionError> {
        // Both modes are fine here: the OS already confines and permissions the socket
        let looks_like_path = peer.contains('/') || peer.contains('\\');
        let name = if !looks_like_path && GenericNamespaced::is_supported() {
            peer.to_ns_name::<GenericNamespaced>()
        } else {
            peer.to_fs_name::<GenericFilePath>()
        }
        .map_err(|e| ConnectionError::InvalidConfig(format!("bad socket name {peer}: {e}")))?;

        let stream = LocalStream::connect(name).map_err(ConnectionError::Unreachable)?;
        debug!("Local socket open to {}", peer);
        Ok(Box::new(stream))
    }
}

/// Build the connector for a configured transport.
pub fn connector_for(
    transport: Transport,
    connect_timeout: Duration,
    write_timeout: Option<Duration>,
) -> Box<dyn Connector> {
    match transport {
        Transport::Tcp => Box::new(TcpConnector {
            connect_timeout,
            write_timeout,
        }),
        Transport::LocalSocket => Box::new(LocalSocketConnector),
    }
}

/// Lifecycle of a connection. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkState {
    Pending = 0,
    Ready = 1,
    Closed = 2,
}

impl LinkState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::Ready,
            _ => Self::Closed,
        }
    }
}

/// One open byte stream to a peer.
///
/// Never reopened after `close`; reconnecting creates a new instance.
/// The socket is released on `close` or on drop, whichever comes first.
pub struct StreamConnection {
    peer: String,
    mode: SocketMode,
    state: AtomicU8,
    faulted: AtomicBool,
    sink: Mutex<Option<ByteSink>>,
}

impl StreamConnection {
    pub fn new(peer: impl Into<String>, mode: SocketMode, sink: ByteSink) -> Self {
        Self {
            peer: peer.into(),
            mode,
            state: AtomicU8::new(LinkState::Pending as u8),
            faulted: AtomicBool::new(false),
            sink: Mutex::new(Some(sink)),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn mode(&self) -> SocketMode {
        self.mode
    }

    pub fn state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Non-blocking readiness check.
    pub fn is_ready(&self) -> bool {
        self.state() == LinkState::Ready
    }

    /// True once any write has failed on this connection.
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    /// Confirm the channel accepts writes, then mark it ready.
    pub fn complete_handshake(&self) -> io::Result<()> {
        {
            let mut guard = self
                .sink
                .lock()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "sink lock poisoned"))?;
            let sink = guard
                .as_mut()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "closed"))?;
            sink.flush()?;
        }

        match self.state.compare_exchange(
            LinkState::Pending as u8,
            LinkState::Ready as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(_) => Err(io::Error::new(io::ErrorKind::NotConnected, "closed")),
        }
    }

    /// Write all of `bytes` and flush. Never blocks waiting on another user
    /// of the stream.
    pub fn send(&self, bytes: &[u8]) -> Result<(), WriteError> {
        if !self.is_ready() {
            return Err(WriteError::NotReady);
        }

        let mut guard = match self.sink.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(WriteError::Busy),
            Err(TryLockError::Poisoned(_)) => return Err(WriteError::Closed),
        };
        let sink = guard.as_mut().ok_or(WriteError::Closed)?;

        let result = sink
            .write_all(bytes)
            .map_err(WriteError::Write)
            .and_then(|()| sink.flush().map_err(WriteError::Flush));

        if result.is_err() {
            self.faulted.store(true, Ordering::Release);
        }
        result
    }

    /// Release the socket. Idempotent.
    pub fn close(&self) {
        let previous = self.state.swap(LinkState::Closed as u8, Ordering::AcqRel);
        if previous == LinkState::Closed as u8 {
            return;
        }

        let sink = match self.sink.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(mut sink) = sink {
            if let Err(e) = sink.flush() {
                warn!("Flush on close failed for {}: {}", self.peer, e);
            }
        }
        info!("Connection to {} closed", self.peer);
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConnection")
            .field("peer", &self.peer)
            .field("mode", &self.mode)
            .field("state", &self.state())
            .field("faulted", &self.is_faulted())
            .finish()
    }
}
