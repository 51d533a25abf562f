//! Streaming Bridge
//!
//! Turns pose callbacks into frames on the link. Best effort and
//! at-most-once: a sample that arrives while the link is not ready is
//! dropped, a failed write is counted and forgotten. Nothing here ever
//! blocks, retries or lets an error escape into the tracking callback.

use crate::domain::models::{AppEvent, CoordinateFramePair, MessageSeverity, PoseSample, StatusMessage};
use crate::error::WriteError;
use crate::infrastructure::link::protocol::{Frame, FrameEncoder};
use crate::infrastructure::tracking::{PoseSource, SubscriptionHandle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, trace, warn};

/// Where frames go. Implemented by the connection manager.
pub trait FrameLink: Send + Sync {
    /// Non-blocking readiness check.
    fn is_ready(&self) -> bool;

    /// Write one whole frame and flush it.
    fn send_frame(&self, frame: &Frame) -> Result<(), WriteError>;
}

/// What happened to one pose sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Dropped,
    Failed,
}

#[derive(Debug, Default)]
pub struct BridgeStats {
    frames_sent: AtomicU64,
    frames_dropped: AtomicU64,
    write_failures: AtomicU64,
    failing: AtomicBool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub write_failures: u64,
}

impl BridgeStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Per-event policy: ready check, encode, write, flush.
#[derive(Clone)]
pub struct PoseForwarder {
    link: Arc<dyn FrameLink>,
    encoder: FrameEncoder,
    stats: Arc<BridgeStats>,
    event_sender: Option<mpsc::UnboundedSender<AppEvent>>,
}

impl PoseForwarder {
    pub fn new(link: Arc<dyn FrameLink>, encoder: FrameEncoder) -> Self {
        Self {
            link,
            encoder,
            stats: Arc::new(BridgeStats::default()),
            event_sender: None,
        }
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    pub fn forward(&self, sample: &PoseSample) -> Delivery {
        if !self.link.is_ready() {
            self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
            trace!("Link not ready, dropping pose at t={}", sample.timestamp);
            return Delivery::Dropped;
        }

        let frame = self.encoder.encode(sample);
        match self.link.send_frame(&frame) {
            Ok(()) => {
                self.stats.frames_sent.fetch_add(1, Ordering::Relaxed);
                if self.stats.failing.swap(false, Ordering::Relaxed) {
                    info!("Frame writes recovered");
                }
                trace!("Frame sent: {:?}", sample.position);
                Delivery::Sent
            }
            // Readiness changed between the check and the write
            Err(WriteError::NotReady) | Err(WriteError::Busy) => {
                self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                Delivery::Dropped
            }
            Err(e) => {
                self.stats.write_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Frame write failed: {}", e);
                if !self.stats.failing.swap(true, Ordering::Relaxed) {
                    self.send_log(&format!("Frame write failed: {}", e));
                }
                Delivery::Failed
            }
        }
    }

    fn send_log(&self, message: &str) {
        if let Some(sender) = &self.event_sender {
            let _ = sender.send(AppEvent::LogMessage(StatusMessage::new(
                message,
                MessageSeverity::Warning,
            )));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Subscribed,
    Unsubscribed,
}

/// Subscribes a [`PoseForwarder`] to a pose source.
pub struct StreamingBridge {
    forwarder: PoseForwarder,
    subscription: Option<SubscriptionHandle>,
    state: BridgeState,
}

impl StreamingBridge {
    pub fn new(link: Arc<dyn FrameLink>, encoder: FrameEncoder) -> Self {
        Self {
            forwarder: PoseForwarder::new(link, encoder),
            subscription: None,
            state: BridgeState::Idle,
        }
    }

    /// Report the first write failure of each failing streak on `sender`.
    pub fn with_event_sender(mut self, sender: mpsc::UnboundedSender<AppEvent>) -> Self {
        self.forwarder.event_sender = Some(sender);
        self
    }

    /// Start forwarding poses for `pair`. A bridge subscribes once; after
    /// `unsubscribe` build a new one.
    pub fn subscribe(
        &mut self,
        source: &dyn PoseSource,
        pair: CoordinateFramePair,
    ) -> anyhow::Result<()> {
        match self.state {
            BridgeState::Idle => {}
            BridgeState::Subscribed => anyhow::bail!("Bridge already subscribed"),
            BridgeState::Unsubscribed => anyhow::bail!("Bridge already unsubscribed"),
        }

        let forwarder = self.forwarder.clone();
        let handle = source.subscribe(
            pair,
            Box::new(move |sample: PoseSample| {
                forwarder.forward(&sample);
            }),
        )?;

        info!("Bridge subscribed to {:?} (subscription {})", pair, handle.id());
        self.subscription = Some(handle);
        self.state = BridgeState::Subscribed;
        Ok(())
    }

    pub fn unsubscribe(&mut self) {
        if let Some(handle) = self.subscription.take() {
            handle.cancel();
            self.state = BridgeState::Unsubscribed;
            info!("Bridge unsubscribed");
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// False once the source has dropped the subscription on its own.
    pub fn is_receiving(&self) -> bool {
        self.subscription
            .as_ref()
            .map(SubscriptionHandle::is_active)
            .unwrap_or(false)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.forwarder.stats().snapshot()
    }

    pub fn forwarder(&self) -> &PoseForwarder {
        &self.forwarder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::link::protocol::FRAME_LEN;
    use crate::infrastructure::tracking::PoseDispatcher;
    use std::io;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockLink {
        ready: AtomicBool,
        fail_next: AtomicBool,
        writes: Mutex<Vec<Vec<u8>>>,
    }

    impl MockLink {
        fn ready() -> Arc<Self> {
            let link = Self::default();
            link.ready.store(true, Ordering::SeqCst);
            Arc::new(link)
        }

        fn write_count(&self) -> usize {
            self.writes.lock().unwrap().len()
        }
    }

    impl FrameLink for MockLink {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        fn send_frame(&self, frame: &Frame) -> Result<(), WriteError> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(WriteError::Write(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "peer disconnected",
                )));
            }
            self.writes.lock().unwrap().push(frame.as_bytes().to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_not_ready_writes_nothing() {
        let link = Arc::new(MockLink::default());
        let forwarder = PoseForwarder::new(link.clone(), FrameEncoder::default());

        for _ in 0..10 {
            assert_eq!(forwarder.forward(&PoseSample::at([1.0, 2.0, 3.0])), Delivery::Dropped);
        }
        assert_eq!(link.write_count(), 0);
        assert_eq!(forwarder.stats().snapshot().frames_dropped, 10);
    }

    #[test]
    fn test_reference_sample_on_wire() {
        let link = MockLink::ready();
        let forwarder = PoseForwarder::new(link.clone(), FrameEncoder::default());

        assert_eq!(forwarder.forward(&PoseSample::at([1.5, -2.25, 100.0])), Delivery::Sent);

        let mut expected = Vec::new();
        for v in [1.5f32, -2.25, 100.0] {
            expected.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(*link.writes.lock().unwrap(), vec![expected]);
    }

    #[test]
    fn test_failure_is_not_latched() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let link = MockLink::ready();
        let bridge = StreamingBridge::new(link.clone(), FrameEncoder::default()).with_event_sender(tx);
        let forwarder = bridge.forwarder();

        link.fail_next.store(true, Ordering::SeqCst);
        assert_eq!(forwarder.forward(&PoseSample::at([1.0, 1.0, 1.0])), Delivery::Failed);
        assert_eq!(forwarder.forward(&PoseSample::at([2.0, 2.0, 2.0])), Delivery::Sent);

        assert_eq!(link.write_count(), 1);
        assert_eq!(
            bridge.stats(),
            StatsSnapshot {
                frames_sent: 1,
                frames_dropped: 0,
                write_failures: 1,
            }
        );
        assert!(matches!(rx.try_recv(), Ok(AppEvent::LogMessage(_))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_alternating_readiness() {
        let link = Arc::new(MockLink::default());
        let forwarder = PoseForwarder::new(link.clone(), FrameEncoder::default());

        for i in 0..100 {
            link.ready.store(i % 2 == 0, Ordering::SeqCst);
            forwarder.forward(&PoseSample::at([i as f64, 0.0, 0.0]));
        }

        let writes = link.writes.lock().unwrap();
        assert_eq!(writes.len(), 50);
        assert!(writes.iter().all(|w| w.len() == FRAME_LEN));
    }

    #[test]
    fn test_subscription_lifecycle() {
        let dispatcher = PoseDispatcher::new();
        let link = MockLink::ready();
        let mut bridge = StreamingBridge::new(link.clone(), FrameEncoder::default());
        assert_eq!(bridge.state(), BridgeState::Idle);

        bridge.subscribe(&dispatcher, CoordinateFramePair::default()).unwrap();
        assert_eq!(bridge.state(), BridgeState::Subscribed);
        assert!(bridge.subscribe(&dispatcher, CoordinateFramePair::default()).is_err());

        dispatcher.dispatch(PoseSample::at([1.0, 2.0, 3.0]));
        link.fail_next.store(true, Ordering::SeqCst);
        dispatcher.dispatch(PoseSample::at([4.0, 5.0, 6.0]));
        dispatcher.dispatch(PoseSample::at([7.0, 8.0, 9.0]));

        // A failed write must not look like a handler fault to the source
        assert!(bridge.is_receiving());
        assert_eq!(link.write_count(), 2);

        bridge.unsubscribe();
        assert_eq!(bridge.state(), BridgeState::Unsubscribed);
        assert_eq!(dispatcher.subscriber_count(), 0);
        dispatcher.dispatch(PoseSample::at([1.0, 1.0, 1.0]));
        assert_eq!(link.write_count(), 2);
    }

    #[test]
    fn test_unsubscribed_is_final() {
        let dispatcher = PoseDispatcher::new();
        let link = MockLink::ready();
        let mut bridge = StreamingBridge::new(link.clone(), FrameEncoder::default());

        bridge.subscribe(&dispatcher, CoordinateFramePair::default()).unwrap();
        bridge.unsubscribe();
        assert!(bridge.subscribe(&dispatcher, CoordinateFramePair::default()).is_err());
        assert_eq!(bridge.state(), BridgeState::Unsubscribed);
        assert_eq!(dispatcher.subscriber_count(), 0);

        dispatcher.dispatch(PoseSample::at([1.0, 2.0, 3.0]));
        assert_eq!(link.write_count(), 0);
    }
}
