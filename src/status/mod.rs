mod counter;
mod reconciler;

pub use counter::AggregateCounter;
pub use reconciler::{IngestOutcome, Reconciler};

use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::models::{DeviceScope, SweepReport};

/// Most recent fleet sweep, shared between the poller and the API
#[derive(Clone, Default)]
pub struct SweepSnapshot(Arc<RwLock<Option<SweepReport>>>);

impl SweepSnapshot {
    pub async fn latest(&self) -> Option<SweepReport> {
        self.0.read().await.clone()
    }

    async fn replace(&self, report: SweepReport) {
        *self.0.write().await = Some(report);
    }
}

/// Status poller periodically sweeps the whole fleet and keeps the latest result
pub struct StatusPoller {
    counter: Arc<AggregateCounter>,
    interval_secs: u64,
    snapshot: SweepSnapshot,
    stop_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl StatusPoller {
    pub fn new(counter: Arc<AggregateCounter>, interval_secs: u64) -> Self {
        Self {
            counter,
            interval_secs,
            snapshot: SweepSnapshot::default(),
            stop_tx: None,
        }
    }

    pub fn snapshot(&self) -> SweepSnapshot {
        self.snapshot.clone()
    }

    /// Start the status poller
    pub fn start(&mut self) {
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel();
        self.stop_tx = Some(stop_tx);

        let counter = self.counter.clone();
        let snapshot = self.snapshot.clone();
        let interval_secs = self.interval_secs.max(1);

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match counter.sweep(DeviceScope::All).await {
                            Ok(report) => {
                                tracing::debug!("Fleet sweep of {} device(s): {:?}", report.counts.total(), report.counts);
                                snapshot.replace(report).await;
                            }
                            Err(e) => tracing::warn!("Error sweeping device status: {}", e),
                        }
                    }
                    _ = &mut stop_rx => {
                        tracing::info!("Status poller stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Stop the status poller
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}
