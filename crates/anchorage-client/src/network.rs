//! Storage network capability.
//!
//! The external replicated node network is consumed through this narrow
//! interface: select candidate nodes, push a staged payload to a node
//! set, fetch a payload from a node set. Every operation may fail
//! transiently; classification and retry live in the client, not here.

use anchorage_core::ContentAddress;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod memory;

/// Identity of one storage node returned by selection.
///
/// Opaque to callers of the client; never exposed past its boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node identifier assigned by the network's indexer
    pub id: String,
    /// Endpoint the transfer primitives bind to
    pub endpoint: String,
}

/// Failures of the external node network.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// The indexer could not produce a node set.
    #[error("node selection failed: {reason}")]
    Selection {
        /// Reason reported by the indexer
        reason: String,
    },

    /// Fewer healthy nodes exist than the selection required.
    #[error("insufficient healthy nodes: wanted {wanted}, available {available}")]
    InsufficientNodes {
        /// Nodes the selection asked for
        wanted: usize,
        /// Healthy nodes currently known
        available: usize,
    },

    /// Pushing the staged payload to the node set failed.
    #[error("upload to {nodes} node(s) failed: {reason}")]
    Upload {
        /// Size of the node set the upload was bound to
        nodes: usize,
        /// Reason for the failure
        reason: String,
    },

    /// Fetching the payload from the node set failed.
    #[error("download failed: {reason}")]
    Download {
        /// Reason for the failure
        reason: String,
    },

    /// Local I/O against the staged resource failed mid-transfer.
    #[error("transfer I/O failed")]
    Io(#[from] std::io::Error),
}

/// Capability consumed by the storage client.
///
/// Implementations own their connections; [`close`](StorageNetwork::close)
/// is invoked exactly once during orderly teardown.
#[async_trait]
pub trait StorageNetwork: Send + Sync {
    /// Select at least `min` and up to `expected` healthy nodes.
    async fn select_nodes(&self, min: usize, expected: usize)
        -> Result<Vec<NodeInfo>, NetworkError>;

    /// Push the staged payload at `source` to every node in the set.
    async fn upload(
        &self,
        nodes: &[NodeInfo],
        source: &Path,
        address: &ContentAddress,
    ) -> Result<(), NetworkError>;

    /// Fetch the payload for `address` from the node set into `dest`.
    async fn download(
        &self,
        nodes: &[NodeInfo],
        address: &ContentAddress,
        dest: &Path,
    ) -> Result<(), NetworkError>;

    /// Release owned connections.
    async fn close(&self) -> Result<(), NetworkError>;
}
