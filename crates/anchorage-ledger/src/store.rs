//! Ledger persistence.
//!
//! The store surface is deliberately narrow: keyed insert and lookup,
//! one status update, and two bounded range scans. That is the whole
//! relational contract, so an SQL-backed adapter implements it with a
//! handful of single-table statements.

use crate::types::{BackupStatus, StorageBackup};
use anchorage_core::ContentAddress;
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// Persistence failure of a ledger store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying store rejected or lost the operation.
    #[error("ledger store failure: {reason}")]
    Persistence {
        /// Reason reported by the store
        reason: String,
    },
}

/// Narrow persistence surface for [`StorageBackup`] rows.
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Append a new row.
    async fn insert(&self, row: StorageBackup) -> Result<(), StoreError>;

    /// Most recently backed-up row for an address, if any.
    async fn latest_by_address(
        &self,
        address: &ContentAddress,
    ) -> Result<Option<StorageBackup>, StoreError>;

    /// Move every pending row for an address to `status`, stamping
    /// `verified_at = at`. Returns how many rows changed.
    async fn resolve_pending(
        &self,
        address: &ContentAddress,
        status: BackupStatus,
        at: OffsetDateTime,
    ) -> Result<usize, StoreError>;

    /// Pending rows backed up strictly before `threshold`, oldest first,
    /// at most `limit` rows.
    async fn pending_older_than(
        &self,
        threshold: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<StorageBackup>, StoreError>;

    /// Delete verified rows backed up strictly before `threshold`.
    /// Returns how many rows were removed.
    async fn delete_verified_older_than(
        &self,
        threshold: OffsetDateTime,
    ) -> Result<u64, StoreError>;
}

/// In-process [`BackupStore`] holding rows in memory.
#[derive(Debug, Default)]
pub struct MemoryBackupStore {
    rows: RwLock<Vec<StorageBackup>>,
}

impl MemoryBackupStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Whether the store holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl BackupStore for MemoryBackupStore {
    async fn insert(&self, row: StorageBackup) -> Result<(), StoreError> {
        self.rows.write().await.push(row);
        Ok(())
    }

    async fn latest_by_address(
        &self,
        address: &ContentAddress,
    ) -> Result<Option<StorageBackup>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|row| &row.address == address)
            .max_by_key(|row| row.backed_up_at)
            .cloned())
    }

    async fn resolve_pending(
        &self,
        address: &ContentAddress,
        status: BackupStatus,
        at: OffsetDateTime,
    ) -> Result<usize, StoreError> {
        let mut rows = self.rows.write().await;
        let mut changed = 0;
        for row in rows
            .iter_mut()
            .filter(|row| &row.address == address && row.status == BackupStatus::Pending)
        {
            row.status = status;
            row.verified_at = Some(at);
            changed += 1;
        }
        Ok(changed)
    }

    async fn pending_older_than(
        &self,
        threshold: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<StorageBackup>, StoreError> {
        let rows = self.rows.read().await;
        let mut matching: Vec<StorageBackup> = rows
            .iter()
            .filter(|row| row.status == BackupStatus::Pending && row.backed_up_at < threshold)
            .cloned()
            .collect();
        matching.sort_by_key(|row| row.backed_up_at);
        matching.truncate(limit);
        Ok(matching)
    }

    async fn delete_verified_older_than(
        &self,
        threshold: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| {
            !(row.status == BackupStatus::Verified && row.backed_up_at < threshold)
        });
        Ok((before - rows.len()) as u64)
    }
}
