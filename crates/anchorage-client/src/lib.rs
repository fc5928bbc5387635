//! # Anchorage Client - Replicated Storage Operations
//!
//! The storage client computes content addresses, stages payloads into
//! scoped temporary files, selects nodes, and drives replicated upload
//! and download through the resilience primitives. The external node
//! network is consumed through the narrow [`StorageNetwork`] capability;
//! node selection, the wire protocol, and the indexer algorithm stay
//! behind it.
//!
//! All transient network failures are retried with exponential backoff
//! under a process-wide circuit breaker. Validation failures (empty or
//! oversized payloads, empty addresses) are rejected locally before any
//! network interaction and never consume retry budget.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Storage client implementation
pub mod client;

/// Client configuration
pub mod config;

/// Client error surface
pub mod error;

/// Storage network capability and in-memory implementation
pub mod network;

/// Scoped temporary staging for uploads and downloads
pub mod staging;

pub use client::{ClientMetricsSnapshot, HealthReport, StorageClient};
pub use config::ClientConfig;
pub use error::StorageError;
pub use network::{memory::MemoryNetwork, NetworkError, NodeInfo, StorageNetwork};
