//! Shutdown coordination: a broadcast signal, an in-flight counter with an
//! RAII guard, and a bounded drain loop. The Scheduler is the only consumer;
//! it persists its own `shutdown` snapshot after draining rather than going
//! through a generic hook registry, since Persistence isn't a plugin here.

use crate::{Result, VesperError};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Shutdown signal sent to every subscriber when the Scheduler is asked to
/// stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Stop accepting new events; drain and exit.
    Graceful,
}

/// Shutdown receiver handle.
pub type ShutdownReceiver = broadcast::Receiver<ShutdownSignal>;

/// Coordinates a single shutdown: broadcasts the signal, tracks in-flight
/// mutations via [`RequestGuard`]s, and drains them with a hard deadline.
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<ShutdownSignal>,
    shutting_down: Arc<AtomicBool>,
    in_flight: Arc<AtomicU64>,
    drain_deadline: Duration,
}

impl ShutdownCoordinator {
    /// Create a coordinator with the given drain deadline (spec §4.6
    /// default: 5s).
    pub fn new(drain_deadline: Duration) -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            sender,
            shutting_down: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicU64::new(0)),
            drain_deadline,
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownReceiver {
        self.sender.subscribe()
    }

    /// Whether shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Track one in-flight mutation. Returns `None` once shutdown has
    /// started, so new events are rejected rather than tracked.
    pub fn track(&self) -> Option<RequestGuard> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return None;
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Some(RequestGuard {
            counter: Arc::clone(&self.in_flight),
        })
    }

    /// Current in-flight count.
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Begin shutdown: broadcast the signal and drain in-flight mutations
    /// up to the configured deadline. Returns how many mutations were still
    /// in flight when the deadline hit (`0` means a clean drain).
    pub async fn begin_shutdown(&self) -> Result<u64> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return Err(VesperError::other("shutdown already in progress"));
        }
        let _ = self.sender.send(ShutdownSignal::Graceful);
        self.drain().await
    }

    async fn drain(&self) -> Result<u64> {
        let start = Instant::now();
        loop {
            let count = self.in_flight.load(Ordering::SeqCst);
            if count == 0 {
                debug!("shutdown drain complete");
                return Ok(0);
            }
            if start.elapsed() > self.drain_deadline {
                warn!(in_flight = count, "shutdown drain deadline reached");
                return Ok(count);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// RAII guard tracking one in-flight mutation; decrements on drop.
pub struct RequestGuard {
    counter: Arc<AtomicU64>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guard_decrements_on_drop() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        {
            let _g1 = coordinator.track().unwrap();
            let _g2 = coordinator.track().unwrap();
            assert_eq!(coordinator.in_flight_count(), 2);
        }
        assert_eq!(coordinator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_rejects_new_tracking() {
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(50));
        coordinator.begin_shutdown().await.unwrap();
        assert!(coordinator.is_shutting_down());
        assert!(coordinator.track().is_none());
    }

    #[tokio::test]
    async fn drain_times_out_with_stuck_guard() {
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(30));
        let _stuck = coordinator.track().unwrap();
        let remaining = coordinator.begin_shutdown().await.unwrap();
        assert_eq!(remaining, 1);
    }
}
