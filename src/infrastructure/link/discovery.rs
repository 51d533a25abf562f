//! Discovery / Pairing Gate
//!
//! Decides whether a peer may be connected to before any socket is opened.
//! The answer arrives asynchronously, like a platform pairing dialog.

use std::collections::HashSet;
use tokio::sync::oneshot;
use tracing::info;
use uuid::Uuid;

/// Answer from the pairing gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingOutcome {
    Approved,
    Rejected,
    Cancelled,
}

/// Asynchronous gate consulted before connecting.
pub trait PairingGate: Send + Sync {
    /// Ask whether `peer` exposing `service` may be connected. A dropped
    /// sender counts as [`PairingOutcome::Cancelled`].
    fn request(&self, peer: &str, service: Uuid) -> oneshot::Receiver<PairingOutcome>;
}

/// Approves peers on a fixed list; an empty list approves everyone.
#[derive(Debug, Clone, Default)]
pub struct AllowListGate {
    peers: HashSet<String>,
}

impl AllowListGate {
    pub fn new<I, S>(peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            peers: peers.into_iter().map(Into::into).collect(),
        }
    }
}

impl PairingGate for AllowListGate {
    fn request(&self, peer: &str, service: Uuid) -> oneshot::Receiver<PairingOutcome> {
        let (tx, rx) = oneshot::channel();
        let outcome = if self.peers.is_empty() || self.peers.contains(peer) {
            PairingOutcome::Approved
        } else {
            PairingOutcome::Rejected
        };
        info!("Pairing {} (service {}): {:?}", peer, service, outcome);
        let _ = tx.send(outcome);
        rx
    }
}

/// Wait for the gate, mapping a vanished sender to `Cancelled`.
pub async fn await_pairing(rx: oneshot::Receiver<PairingOutcome>) -> PairingOutcome {
    rx.await.unwrap_or(PairingOutcome::Cancelled)
}
