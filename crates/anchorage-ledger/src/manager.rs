//! Durability ledger over a [`BackupStore`].

use crate::store::{BackupStore, StoreError};
use crate::types::{BackupStatus, StorageBackup};
use anchorage_core::{ContentAddress, UserId};
use anchorage_metrics::{names, MetricsSink};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

/// Rows returned per unverified-backup scan. Sweeps that need more
/// ground cover it across successive passes.
pub const SCAN_PAGE_SIZE: usize = 100;

/// Ledger operation failure.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// No ledger row exists for the requested address.
    #[error("no backup recorded for address {address}")]
    NotFound {
        /// The address that was looked up
        address: String,
    },
    /// The backing store failed.
    #[error("ledger store error")]
    Store(#[from] StoreError),
}

/// Tracks what content has been replicated out and whether each copy
/// has been independently confirmed readable.
pub struct BackupManager {
    store: Arc<dyn BackupStore>,
    metrics: Arc<dyn MetricsSink>,
}

impl BackupManager {
    /// Build a manager over a store, reporting through `metrics`.
    pub fn new(store: Arc<dyn BackupStore>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { store, metrics }
    }

    /// Record a fresh backup in `pending` state and return the row.
    pub async fn record_backup(
        &self,
        user_id: UserId,
        namespace: impl Into<String>,
        address: ContentAddress,
        checksum: impl Into<String>,
        size: u64,
    ) -> Result<StorageBackup, LedgerError> {
        let row = StorageBackup::pending(user_id, namespace, address, checksum, size);
        self.store.insert(row.clone()).await?;
        info!(
            backup_id = %row.id,
            user_id = %row.user_id,
            namespace = %row.namespace,
            address = %row.address,
            size = row.size,
            "backup recorded"
        );
        self.metrics.counter(names::BACKUPS_RECORDED, 1, &[]);
        Ok(row)
    }

    /// Confirm every pending row for an address as verified. Returns how
    /// many rows moved. Rows already verified or failed are untouched, so
    /// the verification timestamp is written at most once per row.
    pub async fn verify_backup(&self, address: &ContentAddress) -> Result<usize, LedgerError> {
        let changed = self
            .store
            .resolve_pending(address, BackupStatus::Verified, OffsetDateTime::now_utc())
            .await?;
        if changed > 0 {
            info!(address = %address, rows = changed, "backup verified");
            self.metrics
                .counter(names::BACKUPS_VERIFIED, changed as u64, &[]);
        } else {
            debug!(address = %address, "no pending rows to verify");
        }
        Ok(changed)
    }

    /// Mark every pending row for an address as failed. Failed is
    /// terminal: the rows keep their resolution timestamp and are never
    /// purged or re-verified.
    pub async fn fail_backup(&self, address: &ContentAddress) -> Result<usize, LedgerError> {
        let changed = self
            .store
            .resolve_pending(address, BackupStatus::Failed, OffsetDateTime::now_utc())
            .await?;
        if changed > 0 {
            info!(address = %address, rows = changed, "backup marked failed");
            self.metrics
                .counter(names::BACKUPS_FAILED, changed as u64, &[]);
        }
        Ok(changed)
    }

    /// Most recent row for an address.
    pub async fn get_backup(&self, address: &ContentAddress) -> Result<StorageBackup, LedgerError> {
        self.store
            .latest_by_address(address)
            .await?
            .ok_or_else(|| LedgerError::NotFound {
                address: address.to_string(),
            })
    }

    /// Pending rows at least `older_than` old, oldest first, capped at
    /// [`SCAN_PAGE_SIZE`].
    pub async fn list_unverified_backups(
        &self,
        older_than: Duration,
    ) -> Result<Vec<StorageBackup>, LedgerError> {
        let threshold = OffsetDateTime::now_utc() - older_than;
        Ok(self
            .store
            .pending_older_than(threshold, SCAN_PAGE_SIZE)
            .await?)
    }

    /// Purge verified rows at least `older_than` old. Pending and failed
    /// rows are never deleted. Returns how many rows were removed.
    pub async fn delete_old_backups(&self, older_than: Duration) -> Result<u64, LedgerError> {
        let threshold = OffsetDateTime::now_utc() - older_than;
        let removed = self.store.delete_verified_older_than(threshold).await?;
        if removed > 0 {
            info!(rows = removed, "old verified backups purged");
            self.metrics.counter(names::BACKUPS_PURGED, removed, &[]);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackupStore;
    use anchorage_core::merkle_root;
    use anchorage_metrics::MemoryMetrics;
    use assert_matches::assert_matches;

    fn manager_with(
        store: Arc<MemoryBackupStore>,
        metrics: Arc<MemoryMetrics>,
    ) -> BackupManager {
        BackupManager::new(store, metrics)
    }

    fn address_for(payload: &[u8]) -> ContentAddress {
        merkle_root(payload)
    }

    #[tokio::test]
    async fn record_then_get_round_trips() {
        let store = Arc::new(MemoryBackupStore::new());
        let metrics = MemoryMetrics::shared();
        let manager = manager_with(store, Arc::clone(&metrics));

        let user = UserId::generate();
        let address = address_for(b"hello ledger");
        let row = manager
            .record_backup(user, "documents", address, "abc123", 12)
            .await
            .unwrap();

        assert_eq!(row.status, BackupStatus::Pending);
        assert!(row.verified_at.is_none());

        let fetched = manager.get_backup(&address).await.unwrap();
        assert_eq!(fetched.id, row.id);
        assert_eq!(fetched.user_id, user);
        assert_eq!(fetched.namespace, "documents");
        assert_eq!(metrics.counter_value(names::BACKUPS_RECORDED, &[]), 1);
    }

    #[tokio::test]
    async fn get_unknown_address_is_not_found() {
        let manager = manager_with(Arc::new(MemoryBackupStore::new()), MemoryMetrics::shared());
        let err = manager
            .get_backup(&address_for(b"never stored"))
            .await
            .unwrap_err();
        assert_matches!(err, LedgerError::NotFound { .. });
    }

    #[tokio::test]
    async fn verify_moves_pending_rows_and_stamps_once() {
        let store = Arc::new(MemoryBackupStore::new());
        let metrics = MemoryMetrics::shared();
        let manager = manager_with(Arc::clone(&store), Arc::clone(&metrics));

        let address = address_for(b"verify me");
        manager
            .record_backup(UserId::generate(), "ns", address, "sum", 9)
            .await
            .unwrap();

        assert_eq!(manager.verify_backup(&address).await.unwrap(), 1);
        let verified = manager.get_backup(&address).await.unwrap();
        assert_eq!(verified.status, BackupStatus::Verified);
        let stamp = verified.verified_at.unwrap();

        // A second verification pass finds nothing pending and leaves
        // the original timestamp alone.
        assert_eq!(manager.verify_backup(&address).await.unwrap(), 0);
        let again = manager.get_backup(&address).await.unwrap();
        assert_eq!(again.verified_at, Some(stamp));
        assert_eq!(metrics.counter_value(names::BACKUPS_VERIFIED, &[]), 1);
    }

    #[tokio::test]
    async fn failed_rows_are_terminal() {
        let store = Arc::new(MemoryBackupStore::new());
        let metrics = MemoryMetrics::shared();
        let manager = manager_with(Arc::clone(&store), Arc::clone(&metrics));

        let address = address_for(b"doomed");
        manager
            .record_backup(UserId::generate(), "ns", address, "sum", 6)
            .await
            .unwrap();

        assert_eq!(manager.fail_backup(&address).await.unwrap(), 1);
        assert_eq!(
            manager.get_backup(&address).await.unwrap().status,
            BackupStatus::Failed
        );

        // Failed rows never flip back to verified.
        assert_eq!(manager.verify_backup(&address).await.unwrap(), 0);
        assert_eq!(
            manager.get_backup(&address).await.unwrap().status,
            BackupStatus::Failed
        );
        assert_eq!(metrics.counter_value(names::BACKUPS_FAILED, &[]), 1);
    }

    #[tokio::test]
    async fn unverified_scan_is_oldest_first_age_filtered_and_capped() {
        let store = Arc::new(MemoryBackupStore::new());
        let manager = manager_with(Arc::clone(&store), MemoryMetrics::shared());
        let now = OffsetDateTime::now_utc();

        // 105 old pending rows plus one too fresh to match.
        for i in 0..105u64 {
            let mut row = StorageBackup::pending(
                UserId::generate(),
                "ns",
                address_for(format!("row {i}").as_bytes()),
                "sum",
                i,
            );
            row.backed_up_at = now - Duration::hours(2) - Duration::seconds(i as i64);
            store.insert(row).await.unwrap();
        }
        let mut fresh = StorageBackup::pending(
            UserId::generate(),
            "ns",
            address_for(b"fresh"),
            "sum",
            1,
        );
        fresh.backed_up_at = now - Duration::minutes(5);
        store.insert(fresh).await.unwrap();

        let page = manager
            .list_unverified_backups(Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(page.len(), SCAN_PAGE_SIZE);
        assert!(page
            .windows(2)
            .all(|pair| pair[0].backed_up_at <= pair[1].backed_up_at));
        assert!(page.iter().all(|row| row.backed_up_at < now - Duration::hours(1)));
    }

    #[tokio::test]
    async fn purge_removes_only_old_verified_rows() {
        let store = Arc::new(MemoryBackupStore::new());
        let metrics = MemoryMetrics::shared();
        let manager = manager_with(Arc::clone(&store), Arc::clone(&metrics));
        let now = OffsetDateTime::now_utc();

        let verified_old = address_for(b"verified old");
        let pending_old = address_for(b"pending old");
        let failed_old = address_for(b"failed old");
        let verified_new = address_for(b"verified new");

        for (address, age) in [
            (verified_old, Duration::days(40)),
            (pending_old, Duration::days(40)),
            (failed_old, Duration::days(40)),
            (verified_new, Duration::days(3)),
        ] {
            let mut row =
                StorageBackup::pending(UserId::generate(), "ns", address, "sum", 1);
            row.backed_up_at = now - age;
            store.insert(row).await.unwrap();
        }
        manager.verify_backup(&verified_old).await.unwrap();
        manager.fail_backup(&failed_old).await.unwrap();
        manager.verify_backup(&verified_new).await.unwrap();

        let removed = manager.delete_old_backups(Duration::days(30)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(metrics.counter_value(names::BACKUPS_PURGED, &[]), 1);

        // Pending and failed survive regardless of age, fresh verified too.
        assert!(manager.get_backup(&verified_old).await.is_err());
        assert!(manager.get_backup(&pending_old).await.is_ok());
        assert!(manager.get_backup(&failed_old).await.is_ok());
        assert!(manager.get_backup(&verified_new).await.is_ok());
    }
}
