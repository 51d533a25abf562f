use super::{PoseHandler, PoseSource};
use crate::domain::models::{CoordinateFramePair, PoseSample};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, error};

struct Subscriber {
    id: u64,
    pair: CoordinateFramePair,
    active: AtomicBool,
    handler: Mutex<PoseHandler>,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
}

impl Registry {
    fn remove(&self, id: u64) {
        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers.retain(|s| s.id != id);
    }
}

/// Registered pose handlers, delivered to in registration order.
///
/// Each handler sees samples one at a time in the order they were
/// dispatched. A handler that panics is dropped and receives nothing more.
#[derive(Clone, Default)]
pub struct PoseDispatcher {
    registry: Arc<Registry>,
}

impl PoseDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, pair: CoordinateFramePair, handler: PoseHandler) -> SubscriptionHandle {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber {
            id,
            pair,
            active: AtomicBool::new(true),
            handler: Mutex::new(handler),
        });

        match self.registry.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(subscriber.clone()),
            Err(poisoned) => poisoned.into_inner().push(subscriber.clone()),
        }
        debug!("Pose subscription {} registered for {:?}", id, pair);

        SubscriptionHandle {
            id,
            registry: Arc::downgrade(&self.registry),
            subscriber: Arc::downgrade(&subscriber),
        }
    }

    /// Deliver `sample` to every active handler subscribed to its frame pair.
    /// Returns how many handlers ran to completion.
    pub fn dispatch(&self, sample: PoseSample) -> usize {
        let targets: Vec<Arc<Subscriber>> = match self.registry.subscribers.lock() {
            Ok(subscribers) => subscribers
                .iter()
                .filter(|s| s.pair == sample.frame)
                .cloned()
                .collect(),
            Err(_) => return 0,
        };

        let mut delivered = 0;
        for subscriber in targets {
            if !subscriber.active.load(Ordering::Acquire) {
                continue;
            }

            let outcome = match subscriber.handler.lock() {
                Ok(mut guard) => {
                    let handler = &mut *guard;
                    panic::catch_unwind(AssertUnwindSafe(|| handler(sample)))
                }
                Err(_) => Err(Box::new("handler poisoned") as Box<dyn std::any::Any + Send>),
            };

            match outcome {
                Ok(()) => delivered += 1,
                Err(_) => {
                    error!("Pose handler {} faulted; unsubscribing it", subscriber.id);
                    subscriber.active.store(false, Ordering::Release);
                    self.registry.remove(subscriber.id);
                }
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry
            .subscribers
            .lock()
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

impl PoseSource for PoseDispatcher {
    fn subscribe(
        &self,
        pair: CoordinateFramePair,
        handler: PoseHandler,
    ) -> anyhow::Result<SubscriptionHandle> {
        Ok(self.register(pair, handler))
    }
}

/// Live subscription. Cancelled explicitly or when dropped.
pub struct SubscriptionHandle {
    id: u64,
    registry: Weak<Registry>,
    subscriber: Weak<Subscriber>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Still receiving samples.
    pub fn is_active(&self) -> bool {
        self.subscriber
            .upgrade()
            .map(|s| s.active.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    pub fn cancel(self) {
        // Drop does the work
    }

    fn unsubscribe(&self) {
        if let Some(subscriber) = self.subscriber.upgrade() {
            subscriber.active.store(false, Ordering::Release);
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
            debug!("Pose subscription {} cancelled", self.id);
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
