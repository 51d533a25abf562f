//! Tracking Module
//!
//! Subscription interface to the motion-tracking service.
//!
//! - [`dispatcher`] - Handler registry and in-order delivery
//! - [`simulated`] - Synthetic tracking service for demos and tests

pub mod dispatcher;
pub mod simulated;

use crate::domain::models::{CoordinateFramePair, PoseSample};

pub use dispatcher::{PoseDispatcher, SubscriptionHandle};
pub use simulated::SimulatedTracker;

/// Callback run on the service's dispatch thread. Must return promptly.
pub type PoseHandler = Box<dyn FnMut(PoseSample) + Send + 'static>;

/// Anything that delivers pose updates for a coordinate frame pair.
pub trait PoseSource {
    fn subscribe(
        &self,
        pair: CoordinateFramePair,
        handler: PoseHandler,
    ) -> anyhow::Result<SubscriptionHandle>;
}
