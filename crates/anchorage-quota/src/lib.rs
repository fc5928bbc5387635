//! # Anchorage Quota - Admission Control and Cost Accounting
//!
//! Tracks per-user storage and compute usage against tiered limits and
//! gates admission to storage operations. Byte and token limits are hard
//! gates enforced through the read-only `check_*` calls; the monthly cost
//! limit is advisory and only ever logged.
//!
//! The check/record split is deliberate: callers decide the staleness
//! window of a check, at the cost of a race between check and record.
//! Transient over-admission under concurrent load is an accepted
//! trade-off, not a bug.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Quota manager and user quota state
pub mod manager;

/// Quota tiers and per-unit rates
pub mod tier;

pub use manager::{CostEstimate, QuotaError, QuotaManager, UserQuota};
pub use tier::{QuotaTier, TierLimits, COMPUTE_COST_PER_1K_TOKENS, STORAGE_COST_PER_GIB};
