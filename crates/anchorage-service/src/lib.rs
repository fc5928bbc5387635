//! # Anchorage Service - Storage Integration Facade
//!
//! One front door over the storage integration: admission through the
//! quota manager, transfer through the replicated storage client, and a
//! durability ledger row for every successful store. The facade owns the
//! shared components and hands out a preconfigured maintenance worker
//! for the background sweeps.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Aggregated service configuration
pub mod config;

/// Storage service facade
pub mod service;

pub use config::{ConfigError, ServiceConfig};
pub use service::{ServiceError, StorageService, StoreReceipt};
