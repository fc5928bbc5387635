//! Replicated storage client.

use crate::config::ClientConfig;
use crate::error::StorageError;
use crate::network::{NetworkError, StorageNetwork};
use crate::staging::StagedPayload;
use anchorage_core::{merkle_root, payload_checksum, ContentAddress};
use anchorage_metrics::{names, MetricsSink};
use anchorage_resilience::{retry, BreakerError, CircuitBreaker, RetryError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Name of the guarded external dependency.
const DEPENDENCY: &str = "storage-network";

/// Readiness report produced by [`StorageClient::health_check`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Whether the node network answered with at least one node
    pub healthy: bool,
    /// Healthy nodes the selection returned
    pub available_nodes: usize,
    /// Observed selection latency
    pub latency: Duration,
}

/// Point-in-time counters exposed by [`StorageClient::metrics_snapshot`].
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ClientMetricsSnapshot {
    /// Successful uploads since construction
    pub uploads: u64,
    /// Successful downloads since construction
    pub downloads: u64,
    /// Bytes stored by successful uploads
    pub stored_bytes: u64,
    /// Bytes returned by successful downloads
    pub retrieved_bytes: u64,
}

/// Client for storing and retrieving opaque payloads on the replicated
/// node network.
///
/// Operations run select-and-transfer as a single retryable unit wrapped
/// by a process-wide circuit breaker. The content address returned by
/// [`store`](Self::store) is a deterministic function of the payload
/// bytes and the sole key for later retrieval.
pub struct StorageClient {
    config: ClientConfig,
    network: Arc<dyn StorageNetwork>,
    breaker: CircuitBreaker,
    metrics: Arc<dyn MetricsSink>,
    uploads: AtomicU64,
    downloads: AtomicU64,
    stored_bytes: AtomicU64,
    retrieved_bytes: AtomicU64,
    closed: AtomicBool,
}

impl StorageClient {
    /// Create a client over the given network capability.
    pub fn new(
        config: ClientConfig,
        network: Arc<dyn StorageNetwork>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let breaker = CircuitBreaker::new(DEPENDENCY, config.breaker.clone());
        Self {
            config,
            network,
            breaker,
            metrics,
            uploads: AtomicU64::new(0),
            downloads: AtomicU64::new(0),
            stored_bytes: AtomicU64::new(0),
            retrieved_bytes: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Store a payload with the requested replica count.
    ///
    /// Validation happens locally with zero side effects; the content
    /// address is computed before any network call, so callers can
    /// precompute the address they expect back. A request below the
    /// configured minimum replica count gets the configured default.
    pub async fn store(
        &self,
        payload: &[u8],
        requested_replicas: usize,
    ) -> Result<ContentAddress, StorageError> {
        self.ensure_open()?;

        if payload.is_empty() {
            return Err(StorageError::EmptyPayload);
        }
        if payload.len() > self.config.max_payload_bytes {
            return Err(StorageError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_bytes,
            });
        }

        let checksum = payload_checksum(payload);
        let staged = StagedPayload::write(payload).map_err(|source| StorageError::Staging {
            operation: "store",
            source,
        })?;
        let address = merkle_root(payload);

        let replicas = if requested_replicas < self.config.min_replicas {
            self.config.default_replicas
        } else {
            requested_replicas
        };

        debug!(
            address = %address,
            checksum = %checksum,
            size = payload.len(),
            replicas,
            "storing payload"
        );

        let started = Instant::now();
        let network = self.network.as_ref();
        let min_replicas = self.config.min_replicas;
        let path = staged.path();

        let outcome = self
            .breaker
            .call(retry(&self.config.retry, "store", || async move {
                let nodes = network.select_nodes(min_replicas, replicas).await?;
                network.upload(&nodes, path, &address).await?;
                Ok::<usize, NetworkError>(nodes.len())
            }))
            .await;

        let duration = started.elapsed();
        match outcome {
            Ok(node_count) => {
                self.uploads.fetch_add(1, Ordering::Relaxed);
                self.stored_bytes
                    .fetch_add(payload.len() as u64, Ordering::Relaxed);
                self.metrics
                    .counter(names::STORAGE_UPLOADS, 1, &[("outcome", "success")]);
                self.metrics.counter(
                    names::STORAGE_BYTES,
                    payload.len() as u64,
                    &[("operation", "upload")],
                );
                self.metrics.histogram(
                    names::STORAGE_DURATION_SECONDS,
                    duration.as_secs_f64(),
                    &[("operation", "upload")],
                );
                info!(
                    address = %address,
                    checksum = %checksum,
                    size = payload.len(),
                    replicas = node_count,
                    duration_ms = duration.as_millis() as u64,
                    "payload stored"
                );
                Ok(address)
            }
            Err(err) => {
                self.metrics
                    .counter(names::STORAGE_ERRORS, 1, &[("operation", "store")]);
                Err(map_breaker_error(err, &address, Operation::Store))
            }
        }
    }

    /// Retrieve the payload for a hex-rendered content address.
    pub async fn retrieve(&self, address: &str) -> Result<Vec<u8>, StorageError> {
        if address.is_empty() {
            return Err(StorageError::EmptyAddress);
        }
        let parsed: ContentAddress = address.parse()?;
        self.retrieve_address(&parsed).await
    }

    /// Retrieve the payload for a parsed content address.
    pub async fn retrieve_address(
        &self,
        address: &ContentAddress,
    ) -> Result<Vec<u8>, StorageError> {
        self.ensure_open()?;

        debug!(address = %address, "retrieving payload");

        let staged = StagedPayload::empty().map_err(|source| StorageError::Staging {
            operation: "retrieve",
            source,
        })?;

        let started = Instant::now();
        let network = self.network.as_ref();
        let address = *address;
        let path = staged.path();

        let outcome = self
            .breaker
            .call(retry(&self.config.retry, "retrieve", || async move {
                let nodes = network.select_nodes(1, 1).await?;
                network.download(&nodes, &address, path).await?;
                let bytes = tokio::fs::read(path).await.map_err(NetworkError::Io)?;
                Ok::<Vec<u8>, NetworkError>(bytes)
            }))
            .await;

        let duration = started.elapsed();
        match outcome {
            Ok(bytes) => {
                // Integrity log only; the ledger cross-check belongs to
                // the backup verification sweep.
                let checksum = payload_checksum(&bytes);
                self.downloads.fetch_add(1, Ordering::Relaxed);
                self.retrieved_bytes
                    .fetch_add(bytes.len() as u64, Ordering::Relaxed);
                self.metrics
                    .counter(names::STORAGE_DOWNLOADS, 1, &[("outcome", "success")]);
                self.metrics.counter(
                    names::STORAGE_BYTES,
                    bytes.len() as u64,
                    &[("operation", "download")],
                );
                self.metrics.histogram(
                    names::STORAGE_DURATION_SECONDS,
                    duration.as_secs_f64(),
                    &[("operation", "download")],
                );
                info!(
                    address = %address,
                    checksum = %checksum,
                    size = bytes.len(),
                    duration_ms = duration.as_millis() as u64,
                    "payload retrieved"
                );
                Ok(bytes)
            }
            Err(err) => {
                self.metrics
                    .counter(names::STORAGE_ERRORS, 1, &[("operation", "retrieve")]);
                Err(map_breaker_error(err, &address, Operation::Retrieve))
            }
        }
    }

    /// Probe the node network with a minimal 1-of-1 selection.
    ///
    /// Bypasses the circuit breaker: readiness reporting must observe the
    /// raw dependency state, not a tripped breaker's fast-fail.
    pub async fn health_check(&self) -> Result<HealthReport, StorageError> {
        let started = Instant::now();
        match self.network.select_nodes(1, 1).await {
            Ok(nodes) => Ok(HealthReport {
                healthy: !nodes.is_empty(),
                available_nodes: nodes.len(),
                latency: started.elapsed(),
            }),
            Err(source) => {
                self.metrics
                    .counter(names::STORAGE_ERRORS, 1, &[("operation", "health_check")]);
                Err(StorageError::NodeSelection { source })
            }
        }
    }

    /// Counters accumulated since construction.
    pub fn metrics_snapshot(&self) -> ClientMetricsSnapshot {
        ClientMetricsSnapshot {
            uploads: self.uploads.load(Ordering::Relaxed),
            downloads: self.downloads.load(Ordering::Relaxed),
            stored_bytes: self.stored_bytes.load(Ordering::Relaxed),
            retrieved_bytes: self.retrieved_bytes.load(Ordering::Relaxed),
        }
    }

    /// Release the owned network handle. Idempotent; only the first call
    /// reaches the network.
    pub async fn close(&self) -> Result<(), StorageError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("storage client already closed");
            return Ok(());
        }
        info!("closing storage client");
        self.network
            .close()
            .await
            .map_err(|source| StorageError::Shutdown { source })
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::SeqCst) {
            warn!("operation rejected: client closed");
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

enum Operation {
    Store,
    Retrieve,
}

fn map_breaker_error(
    err: BreakerError<RetryError<NetworkError>>,
    address: &ContentAddress,
    operation: Operation,
) -> StorageError {
    match err {
        BreakerError::Open { name } => StorageError::Unavailable { dependency: name },
        BreakerError::Inner(RetryError {
            attempts, source, ..
        }) => match operation {
            Operation::Store => StorageError::Upload {
                address: address.to_hex(),
                attempts,
                source,
            },
            Operation::Retrieve => StorageError::Download {
                address: address.to_hex(),
                attempts,
                source,
            },
        },
    }
}
