//! Per-user quota manager.
//!
//! The user map sits behind a single reader/writer lock: readers for
//! checks and gets, writers for records, resets, and initialization.
//! Lock scope is the map alone; network latency never holds it.

use crate::tier::{QuotaTier, COMPUTE_COST_PER_1K_TOKENS, STORAGE_COST_PER_GIB};
use anchorage_core::{next_reset, UserId};
use anchorage_metrics::{names, MetricsSink, NoopMetrics};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{info, warn};

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Per-user resource usage against tiered limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserQuota {
    /// Owning user
    pub user_id: UserId,
    /// Storage bytes used; cumulative, never reset by the monthly sweep
    pub storage_bytes: u64,
    /// Storage byte ceiling
    pub storage_limit: u64,
    /// Compute tokens used this accounting period
    pub compute_tokens: u64,
    /// Compute token ceiling per accounting period
    pub compute_limit: u64,
    /// Cost accumulated this accounting period in USD
    pub monthly_cost: f64,
    /// Advisory cost ceiling in USD
    pub monthly_cost_limit: f64,
    /// Exclusive upper bound of the current accounting period
    pub reset_at: OffsetDateTime,
}

/// Pre-flight cost estimate; touches no quota state.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CostEstimate {
    /// Cost of the storage bytes in USD
    pub storage_cost: f64,
    /// Cost of the compute tokens in USD
    pub compute_cost: f64,
    /// Sum of both
    pub total_cost: f64,
}

/// Errors from quota operations.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum QuotaError {
    /// No quota has been initialized for the user.
    #[error("no quota found for user {user}")]
    NotFound {
        /// The user that was looked up
        user: UserId,
    },

    /// A quota already exists; initialization is create-only, not upsert.
    #[error("quota already initialized for user {user}")]
    AlreadyExists {
        /// The user that was initialized twice
        user: UserId,
    },

    /// Admitting the bytes would exceed the storage limit.
    #[error("storage quota exceeded: {used} used + {requested} requested > {limit} bytes")]
    StorageExceeded {
        /// Bytes already used
        used: u64,
        /// Bytes the caller asked to admit
        requested: u64,
        /// Storage ceiling
        limit: u64,
    },

    /// Admitting the tokens would exceed the compute limit.
    #[error("compute quota exceeded: {used} used + {requested} requested > {limit} tokens")]
    ComputeExceeded {
        /// Tokens already used this period
        used: u64,
        /// Tokens the caller asked to admit
        requested: u64,
        /// Compute ceiling
        limit: u64,
    },
}

/// Tracks quotas for all known users.
pub struct QuotaManager {
    quotas: RwLock<HashMap<UserId, UserQuota>>,
    metrics: Arc<dyn MetricsSink>,
}

impl Default for QuotaManager {
    fn default() -> Self {
        Self::new(Arc::new(NoopMetrics))
    }
}

impl QuotaManager {
    /// Create a manager reporting to the given metrics sink.
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            quotas: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Create a quota for a user with limits drawn from the tier table.
    ///
    /// Create-only: fails with [`QuotaError::AlreadyExists`] on repeat.
    pub async fn initialize_quota(&self, user: UserId, tier: QuotaTier) -> Result<(), QuotaError> {
        let mut quotas = self.quotas.write().await;
        if quotas.contains_key(&user) {
            return Err(QuotaError::AlreadyExists { user });
        }

        let limits = tier.limits();
        let now = OffsetDateTime::now_utc();
        quotas.insert(
            user,
            UserQuota {
                user_id: user,
                storage_bytes: 0,
                storage_limit: limits.storage_bytes,
                compute_tokens: 0,
                compute_limit: limits.compute_tokens,
                monthly_cost: 0.0,
                monthly_cost_limit: limits.monthly_cost,
                reset_at: next_reset(now),
            },
        );

        info!(user = %user, tier = ?tier, "quota initialized");
        Ok(())
    }

    /// Read-only admission check for additional storage bytes.
    ///
    /// Mutates nothing; callers record usage separately after the
    /// operation succeeds.
    pub async fn check_storage_quota(
        &self,
        user: UserId,
        additional: u64,
    ) -> Result<(), QuotaError> {
        let quotas = self.quotas.read().await;
        let quota = quotas.get(&user).ok_or(QuotaError::NotFound { user })?;

        if quota.storage_bytes + additional > quota.storage_limit {
            return Err(QuotaError::StorageExceeded {
                used: quota.storage_bytes,
                requested: additional,
                limit: quota.storage_limit,
            });
        }
        Ok(())
    }

    /// Read-only admission check for additional compute tokens.
    pub async fn check_compute_quota(&self, user: UserId, additional: u64) -> Result<(), QuotaError> {
        let quotas = self.quotas.read().await;
        let quota = quotas.get(&user).ok_or(QuotaError::NotFound { user })?;

        if quota.compute_tokens + additional > quota.compute_limit {
            return Err(QuotaError::ComputeExceeded {
                used: quota.compute_tokens,
                requested: additional,
                limit: quota.compute_limit,
            });
        }
        Ok(())
    }

    /// Record stored bytes and accumulate their cost.
    ///
    /// Unconditional: the counters update even when the amount would have
    /// failed a check. A breached cost limit is logged, never enforced.
    pub async fn record_storage(&self, user: UserId, bytes: u64) -> Result<(), QuotaError> {
        let mut quotas = self.quotas.write().await;
        let quota = quotas.get_mut(&user).ok_or(QuotaError::NotFound { user })?;

        quota.storage_bytes += bytes;
        let cost = bytes as f64 / BYTES_PER_GIB * STORAGE_COST_PER_GIB;
        quota.monthly_cost += cost;

        self.report_usage(quota, cost, "storage");
        Ok(())
    }

    /// Record consumed compute tokens and accumulate their cost.
    pub async fn record_compute(&self, user: UserId, tokens: u64) -> Result<(), QuotaError> {
        let mut quotas = self.quotas.write().await;
        let quota = quotas.get_mut(&user).ok_or(QuotaError::NotFound { user })?;

        quota.compute_tokens += tokens;
        let cost = tokens as f64 / 1000.0 * COMPUTE_COST_PER_1K_TOKENS;
        quota.monthly_cost += cost;

        self.report_usage(quota, cost, "compute");
        Ok(())
    }

    /// Snapshot of a user's quota.
    pub async fn get_quota(&self, user: UserId) -> Result<UserQuota, QuotaError> {
        let quotas = self.quotas.read().await;
        quotas
            .get(&user)
            .cloned()
            .ok_or(QuotaError::NotFound { user })
    }

    /// Pure pre-flight estimate using the recording rates.
    pub fn estimate_cost(storage_bytes: u64, compute_tokens: u64) -> CostEstimate {
        let storage_cost = storage_bytes as f64 / BYTES_PER_GIB * STORAGE_COST_PER_GIB;
        let compute_cost = compute_tokens as f64 / 1000.0 * COMPUTE_COST_PER_1K_TOKENS;
        CostEstimate {
            storage_cost,
            compute_cost,
            total_cost: storage_cost + compute_cost,
        }
    }

    /// Lazily reset accounting periods that have elapsed.
    ///
    /// Zeroes compute usage and accumulated cost and advances `reset_at`
    /// by one calendar month. Storage usage is a standing liability and
    /// is never reset. Returns how many quotas were reset.
    pub async fn reset_monthly_quotas(&self) -> usize {
        let mut quotas = self.quotas.write().await;
        let now = OffsetDateTime::now_utc();
        let mut reset_count = 0;

        for (user, quota) in quotas.iter_mut() {
            if now > quota.reset_at {
                quota.compute_tokens = 0;
                quota.monthly_cost = 0.0;
                quota.reset_at = next_reset(now);
                reset_count += 1;
                info!(user = %user, reset_at = %quota.reset_at, "monthly quota reset");
            }
        }

        reset_count
    }

    fn report_usage(&self, quota: &UserQuota, cost: f64, resource: &str) {
        if quota.monthly_cost > quota.monthly_cost_limit {
            warn!(
                user = %quota.user_id,
                monthly_cost = quota.monthly_cost,
                limit = quota.monthly_cost_limit,
                "monthly cost limit exceeded"
            );
        }

        let user = quota.user_id.to_string();
        let usage_percent = if quota.storage_limit == 0 {
            0.0
        } else {
            quota.storage_bytes as f64 / quota.storage_limit as f64 * 100.0
        };
        self.metrics
            .gauge(names::QUOTA_USAGE_PERCENT, usage_percent, &[("user_id", &user)]);
        self.metrics
            .counter(names::COST_TOTAL_USD, (cost * 1e6) as u64, &[("resource", resource)]);
    }
}
