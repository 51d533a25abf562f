//! Error types for the pose link.
//!
//! Establishment errors travel back to whoever called `connect`. Write errors
//! stay inside the bridge and are only counted and logged.

use thiserror::Error;

/// Failure to establish a stream connection to a peer.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Settings could not be turned into a usable connection request.
    #[error("Invalid connection config: {0}")]
    InvalidConfig(String),

    /// Neither `secure` nor `insecure` was requested.
    #[error("No socket mode selected (enable secure or insecure)")]
    NoSocketMode,

    /// Discovery passed but `discover_only` forbids opening a socket.
    #[error("Peer {0} discovered; discover-only mode, no socket opened")]
    DiscoveryOnly(String),

    /// The pairing gate refused the peer.
    #[error("Pairing rejected for peer {0}")]
    PairingRejected(String),

    /// The pairing gate went away before answering.
    #[error("Pairing cancelled for peer {0}")]
    PairingCancelled(String),

    /// The transport cannot open a socket in the requested mode.
    #[error("Transport {transport} does not support {mode} sockets")]
    TransportUnsupported {
        transport: &'static str,
        mode: &'static str,
    },

    /// The peer could not be reached.
    #[error("Peer unreachable: {0}")]
    Unreachable(#[source] std::io::Error),

    /// The socket opened but never became writable.
    #[error("Handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    /// The blocking connect worker died before reporting back.
    #[error("Connect worker failed: {0}")]
    Worker(String),
}

/// Failure to push one frame down an established connection.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Connection not ready")]
    NotReady,

    /// Another party holds the stream right now (e.g. close in progress).
    #[error("Connection busy")]
    Busy,

    #[error("Connection closed")]
    Closed,

    #[error("Write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("Flush failed: {0}")]
    Flush(#[source] std::io::Error),
}

/// Wire bytes that do not form a valid frame.
///
/// Encoding a sample never fails; this only comes out of decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    Length { expected: usize, actual: usize },
}
