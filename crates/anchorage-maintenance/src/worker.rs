//! Interval-driven maintenance sweeps.

use anchorage_client::StorageClient;
use anchorage_core::payload_checksum;
use anchorage_ledger::{BackupManager, LedgerError};
use anchorage_metrics::{names, MetricsSink};
use anchorage_quota::QuotaManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Cadence and thresholds for the maintenance sweeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Rows younger than this are left for a later verification pass,
    /// giving replication time to settle
    pub verification_min_age: time::Duration,
    /// Verified rows older than this are purged
    pub purge_retention: time::Duration,
    /// Time between sweep passes
    pub sweep_interval: std::time::Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            verification_min_age: time::Duration::hours(1),
            purge_retention: time::Duration::days(30),
            sweep_interval: std::time::Duration::from_secs(300),
        }
    }
}

/// Outcome of one verification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerificationOutcome {
    /// Rows confirmed: payload re-fetched and checksum matched
    pub verified: usize,
    /// Rows failed: payload re-fetched but checksum differed
    pub failed: usize,
    /// Rows left pending because the re-fetch itself errored
    pub deferred: usize,
}

/// Aggregate outcome of one full sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Verification pass outcome
    pub verification: VerificationOutcome,
    /// Verified rows removed by the purge pass
    pub purged: u64,
    /// Users whose monthly counters were reset
    pub quotas_reset: usize,
}

/// Background worker running verification, purge, and quota sweeps.
pub struct MaintenanceWorker {
    config: MaintenanceConfig,
    client: Arc<StorageClient>,
    ledger: Arc<BackupManager>,
    quotas: Arc<QuotaManager>,
    metrics: Arc<dyn MetricsSink>,
}

impl MaintenanceWorker {
    /// Build a worker over the shared service components.
    pub fn new(
        config: MaintenanceConfig,
        client: Arc<StorageClient>,
        ledger: Arc<BackupManager>,
        quotas: Arc<QuotaManager>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            config,
            client,
            ledger,
            quotas,
            metrics,
        }
    }

    /// Run one verification pass over a page of unverified rows.
    ///
    /// Each row's object is re-fetched through the storage client and its
    /// SHA-256 checksum compared against the ledger. A match verifies the
    /// row, a mismatch fails it, and a fetch error changes nothing so the
    /// next pass retries the row.
    pub async fn run_verification_once(&self) -> Result<VerificationOutcome, LedgerError> {
        let started = Instant::now();
        let rows = self
            .ledger
            .list_unverified_backups(self.config.verification_min_age)
            .await?;

        let mut outcome = VerificationOutcome::default();
        for row in rows {
            match self.client.retrieve_address(&row.address).await {
                Ok(payload) => {
                    if payload_checksum(&payload) == row.checksum {
                        outcome.verified += self.ledger.verify_backup(&row.address).await?;
                    } else {
                        warn!(
                            backup_id = %row.id,
                            address = %row.address,
                            "checksum mismatch on re-fetch"
                        );
                        outcome.failed += self.ledger.fail_backup(&row.address).await?;
                    }
                }
                Err(err) => {
                    // Row stays pending; the next sweep picks it up.
                    warn!(
                        backup_id = %row.id,
                        address = %row.address,
                        error = %err,
                        "verification fetch failed"
                    );
                    outcome.deferred += 1;
                }
            }
        }

        self.metrics.histogram(
            names::MAINTENANCE_SWEEP_DURATION_SECONDS,
            started.elapsed().as_secs_f64(),
            &[("sweep", "verification")],
        );
        Ok(outcome)
    }

    /// Run one purge pass over verified rows past retention.
    pub async fn run_purge_once(&self) -> Result<u64, LedgerError> {
        let started = Instant::now();
        let purged = self
            .ledger
            .delete_old_backups(self.config.purge_retention)
            .await?;
        self.metrics.histogram(
            names::MAINTENANCE_SWEEP_DURATION_SECONDS,
            started.elapsed().as_secs_f64(),
            &[("sweep", "purge")],
        );
        Ok(purged)
    }

    /// Apply overdue monthly quota resets.
    pub async fn run_quota_reset_once(&self) -> usize {
        let started = Instant::now();
        let reset = self.quotas.reset_monthly_quotas().await;
        self.metrics.histogram(
            names::MAINTENANCE_SWEEP_DURATION_SECONDS,
            started.elapsed().as_secs_f64(),
            &[("sweep", "quota_reset")],
        );
        reset
    }

    /// Run all three sweeps once.
    pub async fn run_once(&self) -> Result<SweepReport, LedgerError> {
        let verification = self.run_verification_once().await?;
        let purged = self.run_purge_once().await?;
        let quotas_reset = self.run_quota_reset_once().await;

        let report = SweepReport {
            verification,
            purged,
            quotas_reset,
        };
        info!(
            verified = report.verification.verified,
            failed = report.verification.failed,
            deferred = report.verification.deferred,
            purged = report.purged,
            quotas_reset = report.quotas_reset,
            "maintenance sweep complete"
        );
        Ok(report)
    }

    /// Sweep on the configured interval until `shutdown` flips to true.
    ///
    /// A failed sweep is logged and the loop keeps its cadence; one bad
    /// pass must not stall upkeep.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            interval_secs = self.config.sweep_interval.as_secs(),
            "maintenance worker started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.run_once().await {
                        warn!(error = %err, "maintenance sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("maintenance worker stopping");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchorage_client::{ClientConfig, MemoryNetwork};
    use anchorage_core::{merkle_root, UserId};
    use anchorage_ledger::{BackupStatus, MemoryBackupStore};
    use anchorage_metrics::{MemoryMetrics, NoopMetrics};
    use anchorage_quota::QuotaTier;
    use anchorage_resilience::RetryPolicy;

    fn fast_client(network: Arc<MemoryNetwork>) -> Arc<StorageClient> {
        // Single attempt so fetch-failure tests finish without backoff.
        let config = ClientConfig {
            retry: RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::default()
            },
            ..ClientConfig::default()
        };
        Arc::new(StorageClient::new(
            config,
            network,
            Arc::new(NoopMetrics),
        ))
    }

    struct Fixture {
        worker: MaintenanceWorker,
        client: Arc<StorageClient>,
        ledger: Arc<BackupManager>,
        quotas: Arc<QuotaManager>,
    }

    fn fixture(network: Arc<MemoryNetwork>) -> Fixture {
        let client = fast_client(network);
        let ledger = Arc::new(BackupManager::new(
            Arc::new(MemoryBackupStore::new()),
            Arc::new(NoopMetrics),
        ));
        let quotas = Arc::new(QuotaManager::new(Arc::new(NoopMetrics)));
        let config = MaintenanceConfig {
            // Zero min age so rows recorded moments ago are eligible.
            verification_min_age: time::Duration::ZERO,
            ..MaintenanceConfig::default()
        };
        let worker = MaintenanceWorker::new(
            config,
            Arc::clone(&client),
            Arc::clone(&ledger),
            Arc::clone(&quotas),
            MemoryMetrics::shared(),
        );
        Fixture {
            worker,
            client,
            ledger,
            quotas,
        }
    }

    #[tokio::test]
    async fn verification_confirms_matching_checksum() {
        let network = Arc::new(MemoryNetwork::with_nodes(3));
        let fx = fixture(network);

        let payload = b"verify this payload".to_vec();
        let address = fx.client.store(&payload, 1).await.unwrap();
        fx.ledger
            .record_backup(
                UserId::generate(),
                "ns",
                address,
                payload_checksum(&payload),
                payload.len() as u64,
            )
            .await
            .unwrap();

        let outcome = fx.worker.run_verification_once().await.unwrap();
        assert_eq!(
            outcome,
            VerificationOutcome {
                verified: 1,
                failed: 0,
                deferred: 0
            }
        );
        assert_eq!(
            fx.ledger.get_backup(&address).await.unwrap().status,
            BackupStatus::Verified
        );
    }

    #[tokio::test]
    async fn verification_fails_mismatched_checksum() {
        let network = Arc::new(MemoryNetwork::with_nodes(3));
        let fx = fixture(network);

        let payload = b"stored bytes".to_vec();
        let address = fx.client.store(&payload, 1).await.unwrap();
        fx.ledger
            .record_backup(
                UserId::generate(),
                "ns",
                address,
                "not-the-real-checksum",
                payload.len() as u64,
            )
            .await
            .unwrap();

        let outcome = fx.worker.run_verification_once().await.unwrap();
        assert_eq!(outcome.failed, 1);
        assert_eq!(
            fx.ledger.get_backup(&address).await.unwrap().status,
            BackupStatus::Failed
        );
    }

    #[tokio::test]
    async fn fetch_error_leaves_row_pending() {
        let network = Arc::new(MemoryNetwork::with_nodes(3));
        let fx = fixture(network);

        // Ledger row for an object the network never received.
        let address = merkle_root(b"missing object");
        fx.ledger
            .record_backup(UserId::generate(), "ns", address, "sum", 4)
            .await
            .unwrap();

        let outcome = fx.worker.run_verification_once().await.unwrap();
        assert_eq!(outcome.deferred, 1);
        assert_eq!(
            fx.ledger.get_backup(&address).await.unwrap().status,
            BackupStatus::Pending
        );

        // Still pending, so a later pass sees it again.
        let again = fx.worker.run_verification_once().await.unwrap();
        assert_eq!(again.deferred, 1);
    }

    #[tokio::test]
    async fn run_once_aggregates_all_sweeps() {
        let network = Arc::new(MemoryNetwork::with_nodes(3));
        let fx = fixture(network);

        fx.quotas
            .initialize_quota(UserId::generate(), QuotaTier::Free)
            .await
            .unwrap();

        let payload = b"full sweep".to_vec();
        let address = fx.client.store(&payload, 1).await.unwrap();
        fx.ledger
            .record_backup(
                UserId::generate(),
                "ns",
                address,
                payload_checksum(&payload),
                payload.len() as u64,
            )
            .await
            .unwrap();

        let report = fx.worker.run_once().await.unwrap();
        assert_eq!(report.verification.verified, 1);
        assert_eq!(report.purged, 0);
        // Freshly initialized quota is nowhere near its reset deadline.
        assert_eq!(report.quotas_reset, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_stops_on_shutdown() {
        let network = Arc::new(MemoryNetwork::with_nodes(3));
        let fx = fixture(network);
        let worker = Arc::new(fx.worker);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn({
            let worker = Arc::clone(&worker);
            async move { worker.run(rx).await }
        });

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
