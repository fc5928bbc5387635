//! # Anchorage Resilience - Retry and Circuit Breaking
//!
//! Failure-tolerance primitives wrapping calls to the external storage
//! node network:
//!
//! - **Retry**: a bounded executor with exponential backoff. Every error
//!   is uniformly retryable at this layer; callers reject permanent
//!   (validation) failures before entering the retry unit.
//! - **Circuit breaker**: a three-state guard (closed/open/half-open)
//!   shared process-wide per named dependency. When open, calls fail
//!   fast without polling the wrapped future.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Three-state circuit breaker
pub mod breaker;

/// Bounded retry with exponential backoff
pub mod retry;

pub use breaker::{BreakerConfig, BreakerError, BreakerState, CircuitBreaker};
pub use retry::{retry, RetryError, RetryPolicy};
