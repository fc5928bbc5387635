//! Storage client error surface.
//!
//! Validation errors are deterministic and immediate; transient errors
//! carry the attempt count and last cause after retries exhaust; an open
//! circuit breaker surfaces as a distinct unavailable signal so callers
//! can tell "known-futile" apart from "tried and failed".

use crate::network::NetworkError;
use anchorage_core::AddressParseError;

/// Errors returned by the storage client.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The payload was empty; rejected before any network interaction.
    #[error("payload is empty")]
    EmptyPayload,

    /// The payload exceeded the configured maximum size.
    #[error("payload of {size} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Rejected payload size in bytes
        size: usize,
        /// Configured maximum in bytes
        max: usize,
    },

    /// The content address string was empty.
    #[error("content address is empty")]
    EmptyAddress,

    /// The content address string could not be parsed.
    #[error("invalid content address")]
    InvalidAddress(#[from] AddressParseError),

    /// The circuit breaker is open; the network was not attempted.
    #[error("storage network unavailable: circuit breaker '{dependency}' open")]
    Unavailable {
        /// Name of the guarded dependency
        dependency: String,
    },

    /// Node selection failed outside the retried unit (health check).
    #[error("node selection failed: {source}")]
    NodeSelection {
        /// Underlying network failure
        #[source]
        source: NetworkError,
    },

    /// Upload failed after exhausting the retry budget.
    #[error("upload of {address} failed after {attempts} attempts")]
    Upload {
        /// Content address of the payload that failed to upload
        address: String,
        /// Attempts consumed before giving up
        attempts: u32,
        /// Last underlying failure
        #[source]
        source: NetworkError,
    },

    /// Download failed after exhausting the retry budget.
    #[error("download of {address} failed after {attempts} attempts")]
    Download {
        /// Content address that failed to download
        address: String,
        /// Attempts consumed before giving up
        attempts: u32,
        /// Last underlying failure
        #[source]
        source: NetworkError,
    },

    /// Staging the payload into a temporary file failed.
    #[error("staging failed during {operation}")]
    Staging {
        /// The operation that was being staged
        operation: &'static str,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Releasing the owned network handle failed during teardown.
    #[error("network shutdown failed")]
    Shutdown {
        /// Underlying network failure
        #[source]
        source: NetworkError,
    },

    /// The client was already shut down.
    #[error("storage client is closed")]
    Closed,
}
