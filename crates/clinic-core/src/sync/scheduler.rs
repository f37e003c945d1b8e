//! Periodic reconciliation driver.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::models::EntityKind;

use super::engine::{LastReconcile, ReconcileOutcome, ReconciliationEngine};
use super::SyncRecord;

/// Kind-erased view of a [`ReconciliationEngine`].
#[async_trait]
pub trait Reconciler: Send + Sync {
    fn kind(&self) -> EntityKind;

    async fn reconcile_now(&self) -> Result<ReconcileOutcome>;

    async fn reconcile_scheduled(&self) -> Result<ReconcileOutcome>;

    async fn last_reconcile(&self) -> Option<LastReconcile>;
}

#[async_trait]
impl<R: SyncRecord> Reconciler for ReconciliationEngine<R> {
    fn kind(&self) -> EntityKind {
        R::KIND
    }

    async fn reconcile_now(&self) -> Result<ReconcileOutcome> {
        Self::reconcile_now(self).await
    }

    async fn reconcile_scheduled(&self) -> Result<ReconcileOutcome> {
        Self::reconcile_scheduled(self).await
    }

    async fn last_reconcile(&self) -> Option<LastReconcile> {
        Self::last_reconcile(self).await
    }
}

/// Runs every registered reconciler on its own fixed-period timer.
pub struct ReconcileScheduler {
    period: Duration,
    reconcilers: Vec<Arc<dyn Reconciler>>,
}

impl ReconcileScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            reconcilers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, reconciler: Arc<dyn Reconciler>) -> Self {
        self.reconcilers.push(reconciler);
        self
    }

    /// Spawn one timer task per reconciler. The first tick fires immediately.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown, _) = watch::channel(false);
        let tasks = self
            .reconcilers
            .into_iter()
            .map(|reconciler| {
                tracing::info!(
                    kind = %reconciler.kind(),
                    period_secs = self.period.as_secs(),
                    "Starting reconciliation timer"
                );
                tokio::spawn(run_timer(reconciler, self.period, shutdown.subscribe()))
            })
            .collect();

        SchedulerHandle { shutdown, tasks }
    }
}

/// Stops the timers started by [`ReconcileScheduler::start`].
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signal every timer to stop and wait for in-flight cycles to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(error) = task.await {
                tracing::warn!(%error, "Reconciliation timer task ended abnormally");
            }
        }
    }
}

async fn run_timer(
    reconciler: Arc<dyn Reconciler>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let kind = reconciler.kind();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match reconciler.reconcile_scheduled().await {
                    Ok(outcome) => tracing::debug!(%kind, ?outcome, "Scheduled reconciliation done"),
                    // Keep ticking; the next cycle may find the store again.
                    Err(error) => tracing::error!(%kind, %error, "Scheduled reconciliation failed"),
                }
            }
        }
    }

    tracing::info!(%kind, "Reconciliation timer stopped");
}
