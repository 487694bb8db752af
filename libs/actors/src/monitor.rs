//! External heartbeat watchdog.
//!
//! On a fixed interval the monitor probes every watched part's `heartbeat`
//! and reports unresponsive parts to the pipeline owner. The monitor only
//! observes and reports — corrective action (restart, alert) is the owner's
//! policy, not this mechanism's.

use crate::part::PartId;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The probe surface the monitor needs from a part.
pub trait Monitored: Send + Sync {
    fn id(&self) -> &PartId;

    fn heartbeat(&self) -> bool;
}

/// One missed heartbeat, delivered to the pipeline owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatMiss {
    pub part: PartId,
}

/// Periodic heartbeat prober over a set of parts.
pub struct HeartbeatMonitor {
    interval: Duration,
    parts: RwLock<Vec<Arc<dyn Monitored>>>,
    reports: mpsc::UnboundedSender<HeartbeatMiss>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatMonitor {
    /// Create a monitor and the report stream its owner consumes.
    pub fn new(interval: Duration) -> (Arc<Self>, mpsc::UnboundedReceiver<HeartbeatMiss>) {
        let (reports, report_rx) = mpsc::unbounded_channel();
        let monitor = Arc::new(Self {
            interval,
            parts: RwLock::new(Vec::new()),
            reports,
            shutdown: Mutex::new(None),
            task: Mutex::new(None),
        });
        (monitor, report_rx)
    }

    /// Add a part to the probe set. Takes effect on the next tick.
    pub fn watch(&self, part: Arc<dyn Monitored>) {
        debug!(part_id = %part.id(), "Watching part heartbeats");
        self.parts.write().push(part);
    }

    pub fn watched_count(&self) -> usize {
        self.parts.read().len()
    }

    /// Launch the probe loop. A second start is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut shutdown = self.shutdown.lock();
        if shutdown.is_some() {
            warn!("Heartbeat monitor already running");
            return;
        }
        let (stop_tx, mut stop_rx) = watch::channel(false);
        *shutdown = Some(stop_tx);

        let monitor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(interval_ms = monitor.interval.as_millis() as u64, "Heartbeat monitor running");
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => monitor.probe_all(),
                }
            }
            info!("Heartbeat monitor stopped");
        });
        *self.task.lock() = Some(handle);
    }

    /// Stop the probe loop and wait for it to exit.
    pub async fn stop(&self) {
        if let Some(stop_tx) = self.shutdown.lock().take() {
            let _ = stop_tx.send(true);
        }
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn probe_all(&self) {
        let parts = { self.parts.read().clone() };
        for part in parts {
            if !part.heartbeat() {
                warn!(part_id = %part.id(), "Part missed heartbeat");
                let _ = self.reports.send(HeartbeatMiss {
                    part: part.id().clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakePart {
        id: PartId,
        alive: AtomicBool,
    }

    impl FakePart {
        fn new(id: &str, alive: bool) -> Arc<Self> {
            Arc::new(Self {
                id: PartId::new(id),
                alive: AtomicBool::new(alive),
            })
        }
    }

    impl Monitored for FakePart {
        fn id(&self) -> &PartId {
            &self.id
        }

        fn heartbeat(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn reports_only_unresponsive_parts() {
        let (monitor, mut reports) = HeartbeatMonitor::new(Duration::from_millis(20));
        let healthy = FakePart::new("healthy", true);
        let dead = FakePart::new("dead", false);
        monitor.watch(healthy);
        monitor.watch(dead);
        assert_eq!(monitor.watched_count(), 2);

        monitor.start();
        let miss = reports.recv().await.unwrap();
        assert_eq!(miss.part, PartId::new("dead"));
        monitor.stop().await;

        // Nothing was ever reported for the healthy part.
        while let Ok(miss) = reports.try_recv() {
            assert_eq!(miss.part, PartId::new("dead"));
        }
    }

    #[tokio::test]
    async fn recovery_silences_the_reports() {
        let (monitor, mut reports) = HeartbeatMonitor::new(Duration::from_millis(20));
        let part = FakePart::new("flaky", false);
        monitor.watch(part.clone());
        monitor.start();

        assert!(reports.recv().await.is_some());
        part.alive.store(true, Ordering::SeqCst);

        // Let in-flight probes settle, then confirm silence.
        tokio::time::sleep(Duration::from_millis(60)).await;
        while reports.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(reports.try_recv().is_err());

        monitor.stop().await;
    }

    #[tokio::test]
    async fn double_start_is_a_no_op() {
        let (monitor, _reports) = HeartbeatMonitor::new(Duration::from_millis(50));
        monitor.start();
        monitor.start();
        monitor.stop().await;
    }
}
