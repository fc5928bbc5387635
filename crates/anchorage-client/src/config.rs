//! Storage client configuration.

use anchorage_resilience::{BreakerConfig, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Maximum accepted payload size: 10 MiB.
pub const MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Minimum replica count a caller may request.
pub const MIN_REPLICAS: usize = 1;

/// Replica count substituted when a request falls below the minimum.
pub const DEFAULT_REPLICAS: usize = 3;

/// Configuration for the storage client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Largest payload accepted by [`store`](crate::StorageClient::store)
    pub max_payload_bytes: usize,
    /// Requests below this replica count get the default instead
    pub min_replicas: usize,
    /// Replica count used when the caller's request is below the minimum
    pub default_replicas: usize,
    /// Retry policy for the select/upload and select/download units
    pub retry: RetryPolicy,
    /// Circuit breaker guarding the node network
    pub breaker: BreakerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: MAX_PAYLOAD_BYTES,
            min_replicas: MIN_REPLICAS,
            default_replicas: DEFAULT_REPLICAS,
            retry: RetryPolicy::default(),
            breaker: BreakerConfig::default(),
        }
    }
}
