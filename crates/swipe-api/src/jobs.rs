use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use swipe_core::config::ReplicationConfig;
use swipe_core::db::LibSqlListingStore;
use swipe_core::feed::ODataFeedClient;
use swipe_core::sync::{ReplicationReport, Replicator, SweepReport, Sweeper};
use tokio::sync::Mutex;

use crate::error::AppError;

/// Runs replication and reconciliation on request.
///
/// Each job kind runs at most once at a time; a second trigger while one is
/// in progress is rejected rather than queued.
pub struct JobRunner {
    feed: Arc<ODataFeedClient>,
    store: Arc<LibSqlListingStore>,
    replication: ReplicationConfig,
    replicate_lock: Mutex<()>,
    reconcile_lock: Mutex<()>,
    metrics: JobMetrics,
}

#[derive(Default)]
struct JobMetrics {
    replicate_succeeded: AtomicU64,
    replicate_failed: AtomicU64,
    replicate_stopped_early: AtomicU64,
    consecutive_early_stops: AtomicU64,
    reconcile_succeeded: AtomicU64,
    reconcile_failed: AtomicU64,
    rejected_busy: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct JobMetricsSnapshot {
    pub replicate_succeeded: u64,
    pub replicate_failed: u64,
    pub replicate_stopped_early: u64,
    /// Replication runs in a row that stopped on a failed write.
    pub consecutive_early_stops: u64,
    pub reconcile_succeeded: u64,
    pub reconcile_failed: u64,
    pub rejected_busy: u64,
}

impl JobMetrics {
    /// Count a finished replication run and return the current early-stop streak.
    fn record_replication(&self, report: &ReplicationReport) -> u64 {
        self.replicate_succeeded.fetch_add(1, Ordering::Relaxed);
        if report.stopped_early {
            self.replicate_stopped_early.fetch_add(1, Ordering::Relaxed);
            self.consecutive_early_stops.fetch_add(1, Ordering::Relaxed) + 1
        } else {
            self.consecutive_early_stops.store(0, Ordering::Relaxed);
            0
        }
    }
}

impl JobMetricsSnapshot {
    /// Replication is succeeding at the HTTP level but not making progress.
    pub const fn is_degraded(&self) -> bool {
        self.consecutive_early_stops > 1
    }
}

impl JobRunner {
    pub fn new(
        feed: Arc<ODataFeedClient>,
        store: Arc<LibSqlListingStore>,
        replication: ReplicationConfig,
    ) -> Self {
        Self {
            feed,
            store,
            replication,
            replicate_lock: Mutex::new(()),
            reconcile_lock: Mutex::new(()),
            metrics: JobMetrics::default(),
        }
    }

    pub const fn store(&self) -> &Arc<LibSqlListingStore> {
        &self.store
    }

    pub async fn replicate(&self) -> Result<ReplicationReport, AppError> {
        let Ok(_guard) = self.replicate_lock.try_lock() else {
            self.metrics.rejected_busy.fetch_add(1, Ordering::Relaxed);
            return Err(AppError::conflict("Replication is already running"));
        };

        self.pull_replica().await;
        let replicator = Replicator::new(
            Arc::clone(&self.feed),
            Arc::clone(&self.store),
            self.replication,
        );
        match replicator.run().await {
            Ok(report) => {
                let streak = self.metrics.record_replication(&report);
                if streak > 1 {
                    tracing::warn!(
                        job = "replicate",
                        consecutive = streak,
                        cursor = %report.final_cursor,
                        "Replication keeps stopping early at the same failed write"
                    );
                }
                Ok(report)
            }
            Err(error) => {
                self.metrics.replicate_failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(job = "replicate", error = %error, "Job failed");
                Err(error.into())
            }
        }
    }

    pub async fn reconcile(&self) -> Result<SweepReport, AppError> {
        let Ok(_guard) = self.reconcile_lock.try_lock() else {
            self.metrics.rejected_busy.fetch_add(1, Ordering::Relaxed);
            return Err(AppError::conflict("Reconciliation is already running"));
        };

        self.pull_replica().await;
        let sweeper = Sweeper::new(
            Arc::clone(&self.feed),
            Arc::clone(&self.store),
            self.replication.sweep_batch_size,
        );
        match sweeper.run().await {
            Ok(report) => {
                self.metrics
                    .reconcile_succeeded
                    .fetch_add(1, Ordering::Relaxed);
                Ok(report)
            }
            Err(error) => {
                self.metrics.reconcile_failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(job = "reconcile", error = %error, "Job failed");
                Err(error.into())
            }
        }
    }

    pub fn metrics_snapshot(&self) -> JobMetricsSnapshot {
        JobMetricsSnapshot {
            replicate_succeeded: self.metrics.replicate_succeeded.load(Ordering::Relaxed),
            replicate_failed: self.metrics.replicate_failed.load(Ordering::Relaxed),
            replicate_stopped_early: self
                .metrics
                .replicate_stopped_early
                .load(Ordering::Relaxed),
            consecutive_early_stops: self
                .metrics
                .consecutive_early_stops
                .load(Ordering::Relaxed),
            reconcile_succeeded: self.metrics.reconcile_succeeded.load(Ordering::Relaxed),
            reconcile_failed: self.metrics.reconcile_failed.load(Ordering::Relaxed),
            rejected_busy: self.metrics.rejected_busy.load(Ordering::Relaxed),
        }
    }

    // Replica reads are stale until pulled; a failed pull only costs freshness.
    async fn pull_replica(&self) {
        if let Err(error) = self.store.database().sync().await {
            tracing::warn!(error = %error, "Replica sync failed, continuing with local state");
        }
    }
}
