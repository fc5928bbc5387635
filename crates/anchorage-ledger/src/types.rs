//! Ledger row types.

use anchorage_core::{ContentAddress, UserId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Verification state of a ledger row.
///
/// `Pending` rows await the verification sweep; `Verified` and `Failed`
/// are terminal apart from retention purging of verified rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    /// Recorded but not yet confirmed durable
    Pending,
    /// Re-fetched and checksum-confirmed
    Verified,
    /// Verification explicitly failed
    Failed,
}

/// One durability record for a stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageBackup {
    /// Row identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: UserId,
    /// Namespace label the object was stored under
    pub namespace: String,
    /// Content address of the stored object
    pub address: ContentAddress,
    /// SHA-256 checksum of the payload, independent of the address
    pub checksum: String,
    /// Payload size in bytes
    pub size: u64,
    /// When the store succeeded
    pub backed_up_at: OffsetDateTime,
    /// When verification recorded an outcome; set at most once
    pub verified_at: Option<OffsetDateTime>,
    /// Current verification state
    pub status: BackupStatus,
}

impl StorageBackup {
    /// Build a fresh pending row for a successful store.
    pub fn pending(
        user_id: UserId,
        namespace: impl Into<String>,
        address: ContentAddress,
        checksum: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            namespace: namespace.into(),
            address,
            checksum: checksum.into(),
            size,
            backed_up_at: OffsetDateTime::now_utc(),
            verified_at: None,
            status: BackupStatus::Pending,
        }
    }
}
