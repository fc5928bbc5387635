//! Storage service facade.

use crate::config::ServiceConfig;
use anchorage_client::{HealthReport, StorageClient, StorageError};
use anchorage_core::{payload_checksum, ContentAddress, UserId};
use anchorage_ledger::{BackupManager, BackupStore, LedgerError, StorageBackup};
use anchorage_maintenance::MaintenanceWorker;
use anchorage_metrics::MetricsSink;
use anchorage_quota::{CostEstimate, QuotaError, QuotaManager, QuotaTier, UserQuota};
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

/// Failure surface of the service facade.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Admission or accounting failure.
    #[error(transparent)]
    Quota(#[from] QuotaError),
    /// Storage transfer failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Durability ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Everything a caller needs to find and audit a stored object.
#[derive(Debug, Clone, Serialize)]
pub struct StoreReceipt {
    /// Content address, the sole retrieval key
    pub address: ContentAddress,
    /// SHA-256 checksum of the payload
    pub checksum: String,
    /// Payload size in bytes
    pub size: u64,
    /// Replica count the store ran with
    pub replicas: usize,
    /// When the store completed
    pub stored_at: OffsetDateTime,
    /// Ledger row recorded for this store
    pub backup_id: Uuid,
}

/// Front door over quota admission, replicated storage, and the
/// durability ledger.
///
/// A successful [`store`](Self::store) leaves three traces: usage
/// recorded against the user's quota, the payload replicated on the node
/// network, and a pending ledger row for the verification sweep. The
/// quota check runs before any network interaction, so rejected requests
/// are free.
pub struct StorageService {
    config: ServiceConfig,
    client: Arc<StorageClient>,
    quotas: Arc<QuotaManager>,
    ledger: Arc<BackupManager>,
    metrics: Arc<dyn MetricsSink>,
}

impl StorageService {
    /// Wire the facade over a storage network and ledger store.
    pub fn new(
        config: ServiceConfig,
        network: Arc<dyn anchorage_client::StorageNetwork>,
        backup_store: Arc<dyn BackupStore>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let client = Arc::new(StorageClient::new(
            config.client.clone(),
            network,
            Arc::clone(&metrics),
        ));
        let quotas = Arc::new(QuotaManager::new(Arc::clone(&metrics)));
        let ledger = Arc::new(BackupManager::new(backup_store, Arc::clone(&metrics)));
        Self {
            config,
            client,
            quotas,
            ledger,
            metrics,
        }
    }

    /// Register a user at a tier before their first store.
    pub async fn initialize_user(&self, user: UserId, tier: QuotaTier) -> Result<(), ServiceError> {
        self.quotas.initialize_quota(user, tier).await?;
        Ok(())
    }

    /// Store a payload for a user under a namespace label.
    ///
    /// Admission, transfer, and accounting run in that order; the quota
    /// record and the ledger row are each a single write, so a caller
    /// dropping the future mid-flight never leaves a half-committed row.
    #[instrument(skip(self, payload), fields(user = %user, size = payload.len()))]
    pub async fn store(
        &self,
        user: UserId,
        namespace: &str,
        payload: &[u8],
        replicas: usize,
    ) -> Result<StoreReceipt, ServiceError> {
        self.quotas
            .check_storage_quota(user, payload.len() as u64)
            .await?;

        let address = self.client.store(payload, replicas).await?;
        let checksum = payload_checksum(payload);
        let size = payload.len() as u64;

        self.quotas.record_storage(user, size).await?;
        let row: StorageBackup = self
            .ledger
            .record_backup(user, namespace, address, checksum.clone(), size)
            .await?;

        info!(
            user = %user,
            namespace,
            address = %address,
            size,
            backup_id = %row.id,
            "store committed"
        );
        Ok(StoreReceipt {
            address,
            checksum,
            size,
            replicas: self.effective_replicas(replicas),
            stored_at: row.backed_up_at,
            backup_id: row.id,
        })
    }

    /// Retrieve a stored payload by its hex-rendered content address.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn retrieve(&self, user: UserId, address: &str) -> Result<Vec<u8>, ServiceError> {
        Ok(self.client.retrieve(address).await?)
    }

    /// Pre-flight cost estimate for a prospective workload.
    pub fn estimate(storage_bytes: u64, compute_tokens: u64) -> CostEstimate {
        QuotaManager::estimate_cost(storage_bytes, compute_tokens)
    }

    /// Current quota state for a user.
    pub async fn user_quota(&self, user: UserId) -> Result<UserQuota, ServiceError> {
        Ok(self.quotas.get_quota(user).await?)
    }

    /// Probe the storage network.
    pub async fn health(&self) -> Result<HealthReport, ServiceError> {
        Ok(self.client.health_check().await?)
    }

    /// Release owned resources. Safe to call more than once; only the
    /// first call reaches the network.
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("storage service shutting down");
        Ok(self.client.close().await?)
    }

    /// Maintenance worker sharing this service's components.
    pub fn maintenance_worker(&self) -> MaintenanceWorker {
        MaintenanceWorker::new(
            self.config.maintenance.clone(),
            Arc::clone(&self.client),
            Arc::clone(&self.ledger),
            Arc::clone(&self.quotas),
            Arc::clone(&self.metrics),
        )
    }

    /// Shared storage client.
    pub fn client(&self) -> &Arc<StorageClient> {
        &self.client
    }

    /// Shared quota manager.
    pub fn quotas(&self) -> &Arc<QuotaManager> {
        &self.quotas
    }

    /// Shared backup ledger.
    pub fn ledger(&self) -> &Arc<BackupManager> {
        &self.ledger
    }

    fn effective_replicas(&self, requested: usize) -> usize {
        if requested < self.config.client.min_replicas {
            self.config.client.default_replicas
        } else {
            requested
        }
    }
}
