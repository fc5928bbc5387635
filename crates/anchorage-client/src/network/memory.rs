//! In-memory storage network.
//!
//! Holds replicated blobs in a map keyed by content address. Used by the
//! test suites and local simulation; fault injection and a node-selection
//! call counter make "no network interaction happened" observable.

use super::{NetworkError, NodeInfo, StorageNetwork};
use anchorage_core::ContentAddress;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use tokio::sync::RwLock;

/// In-memory implementation of [`StorageNetwork`].
#[derive(Debug)]
pub struct MemoryNetwork {
    nodes: Vec<NodeInfo>,
    blobs: RwLock<HashMap<ContentAddress, Vec<u8>>>,
    select_calls: AtomicU64,
    /// Remaining injected failures, consumed one per operation.
    failing_selections: AtomicU32,
    failing_uploads: AtomicU32,
    failing_downloads: AtomicU32,
    closed: AtomicBool,
}

impl MemoryNetwork {
    /// Network with `node_count` healthy nodes.
    pub fn with_nodes(node_count: usize) -> Self {
        let nodes = (0..node_count)
            .map(|i| NodeInfo {
                id: format!("node-{i}"),
                endpoint: format!("mem://node-{i}"),
            })
            .collect();
        Self {
            nodes,
            blobs: RwLock::new(HashMap::new()),
            select_calls: AtomicU64::new(0),
            failing_selections: AtomicU32::new(0),
            failing_uploads: AtomicU32::new(0),
            failing_downloads: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Fail the next `count` node selections.
    pub fn inject_selection_failures(&self, count: u32) {
        self.failing_selections.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` uploads.
    pub fn inject_upload_failures(&self, count: u32) {
        self.failing_uploads.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` downloads.
    pub fn inject_download_failures(&self, count: u32) {
        self.failing_downloads.store(count, Ordering::SeqCst);
    }

    /// How many times node selection was attempted.
    pub fn select_call_count(&self) -> u64 {
        self.select_calls.load(Ordering::SeqCst)
    }

    /// Whether a blob is held for the address.
    pub async fn contains(&self, address: &ContentAddress) -> bool {
        self.blobs.read().await.contains_key(address)
    }

    /// Whether `close` has been invoked.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn consume_injected(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl StorageNetwork for MemoryNetwork {
    async fn select_nodes(
        &self,
        min: usize,
        expected: usize,
    ) -> Result<Vec<NodeInfo>, NetworkError> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);

        if Self::consume_injected(&self.failing_selections) {
            return Err(NetworkError::Selection {
                reason: "injected selection failure".to_string(),
            });
        }

        if self.nodes.len() < min {
            return Err(NetworkError::InsufficientNodes {
                wanted: min,
                available: self.nodes.len(),
            });
        }

        Ok(self.nodes.iter().take(expected.max(min)).cloned().collect())
    }

    async fn upload(
        &self,
        nodes: &[NodeInfo],
        source: &Path,
        address: &ContentAddress,
    ) -> Result<(), NetworkError> {
        if Self::consume_injected(&self.failing_uploads) {
            return Err(NetworkError::Upload {
                nodes: nodes.len(),
                reason: "injected upload failure".to_string(),
            });
        }

        let payload = tokio::fs::read(source).await?;
        self.blobs.write().await.insert(*address, payload);
        Ok(())
    }

    async fn download(
        &self,
        nodes: &[NodeInfo],
        address: &ContentAddress,
        dest: &Path,
    ) -> Result<(), NetworkError> {
        if Self::consume_injected(&self.failing_downloads) {
            return Err(NetworkError::Download {
                reason: format!("injected download failure across {} node(s)", nodes.len()),
            });
        }

        let blobs = self.blobs.read().await;
        let payload = blobs.get(address).ok_or_else(|| NetworkError::Download {
            reason: format!("no replica holds {address}"),
        })?;
        tokio::fs::write(dest, payload).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), NetworkError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchorage_core::merkle_root;

    #[tokio::test]
    async fn selection_respects_minimum() {
        let network = MemoryNetwork::with_nodes(2);
        assert!(network.select_nodes(3, 3).await.is_err());
        assert_eq!(network.select_nodes(1, 2).await.unwrap().len(), 2);
        assert_eq!(network.select_call_count(), 2);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let network = MemoryNetwork::with_nodes(3);
        network.inject_selection_failures(1);
        assert!(network.select_nodes(1, 1).await.is_err());
        assert!(network.select_nodes(1, 1).await.is_ok());
    }

    #[tokio::test]
    async fn upload_then_download_round_trips_through_files() {
        let network = MemoryNetwork::with_nodes(3);
        let payload = b"replicated blob".to_vec();
        let address = merkle_root(&payload);
        let nodes = network.select_nodes(1, 3).await.unwrap();

        let staged = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(staged.path(), &payload).unwrap();
        network.upload(&nodes, staged.path(), &address).await.unwrap();
        assert!(network.contains(&address).await);

        let dest = tempfile::NamedTempFile::new().unwrap();
        network.download(&nodes, &address, dest.path()).await.unwrap();
        assert_eq!(std::fs::read(dest.path()).unwrap(), payload);
    }
}
