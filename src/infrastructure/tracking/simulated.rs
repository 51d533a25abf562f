//! Simulated Tracking Service
//!
//! Stands in for the hardware tracking service: a dedicated dispatch
//! thread emitting a smooth synthetic trajectory at a fixed rate.

use super::{PoseDispatcher, PoseHandler, PoseSource, SubscriptionHandle};
use crate::domain::models::{CoordinateFramePair, PoseSample};
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Seconds per lap of the synthetic orbit
const ORBIT_PERIOD_S: f64 = 8.0;
const ORBIT_RADIUS_M: f64 = 1.0;
const BOB_AMPLITUDE_M: f64 = 0.1;

pub struct SimulatedTracker {
    dispatcher: PoseDispatcher,
    pair: CoordinateFramePair,
    rate_hz: f64,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SimulatedTracker {
    pub fn new(rate_hz: f64) -> Self {
        Self {
            dispatcher: PoseDispatcher::new(),
            pair: CoordinateFramePair::default(),
            rate_hz,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start the dispatch thread. No-op if already running.
    pub fn start(&mut self) -> anyhow::Result<()> {
        if !self.rate_hz.is_finite() || self.rate_hz <= 0.0 {
            anyhow::bail!("Invalid tracking rate: {} Hz", self.rate_hz);
        }
        if self.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let period = Duration::from_secs_f64(1.0 / self.rate_hz);
        let dispatcher = self.dispatcher.clone();
        let running = self.running.clone();
        let pair = self.pair;

        let worker = thread::Builder::new()
            .name("pose-dispatch".into())
            .spawn(move || {
                let started = Instant::now();
                let mut next_tick = started;
                while running.load(Ordering::Acquire) {
                    let mut sample = trajectory(started.elapsed().as_secs_f64());
                    sample.frame = pair;
                    dispatcher.dispatch(sample);

                    next_tick += period;
                    let now = Instant::now();
                    if next_tick > now {
                        thread::sleep(next_tick - now);
                    } else {
                        // Fell behind; skip ahead rather than burst
                        next_tick = now;
                    }
                }
            });

        match worker {
            Ok(handle) => {
                self.worker = Some(handle);
                info!("Simulated tracker started at {} Hz", self.rate_hz);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(e.into())
            }
        }
    }

    /// Stop the dispatch thread and wait for it.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Pose dispatch thread panicked");
            }
            info!("Simulated tracker stopped");
        }
    }
}

impl PoseSource for SimulatedTracker {
    fn subscribe(
        &self,
        pair: CoordinateFramePair,
        handler: PoseHandler,
    ) -> anyhow::Result<SubscriptionHandle> {
        if pair != self.pair {
            anyhow::bail!("Frame pair {:?} is not tracked (only {:?})", pair, self.pair);
        }
        Ok(self.dispatcher.register(pair, handler))
    }
}

impl Drop for SimulatedTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Pose on a horizontal circle with a slow vertical bob, facing along
/// the direction of travel.
pub fn trajectory(t: f64) -> PoseSample {
    let angle = TAU * t / ORBIT_PERIOD_S;
    let yaw = angle + TAU / 4.0;
    let half = yaw / 2.0;

    PoseSample {
        position: [
            ORBIT_RADIUS_M * angle.cos(),
            BOB_AMPLITUDE_M * (2.0 * angle).sin(),
            ORBIT_RADIUS_M * angle.sin(),
        ],
        orientation: [0.0, half.sin(), 0.0, half.cos()],
        timestamp: t,
        frame: CoordinateFramePair::default(),
    }
}
