//! Quota tiers and billing rates.

use serde::{Deserialize, Serialize};

/// Storage cost in USD per GiB-month.
pub const STORAGE_COST_PER_GIB: f64 = 0.10;

/// Compute cost in USD per 1000 tokens.
pub const COMPUTE_COST_PER_1K_TOKENS: f64 = 0.02;

const GIB: u64 = 1024 * 1024 * 1024;

/// Named bundle of limits assigned to a user at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaTier {
    /// Small storage/compute/cost ceiling
    Free,
    /// Orders of magnitude larger ceilings
    Premium,
}

impl QuotaTier {
    /// Resolve a tier name; unknown names fall back to the free tier.
    pub fn from_name(name: &str) -> Self {
        match name {
            "premium" => Self::Premium,
            _ => Self::Free,
        }
    }

    /// The limits this tier grants.
    pub fn limits(&self) -> TierLimits {
        match self {
            Self::Free => TierLimits {
                storage_bytes: GIB,
                compute_tokens: 100_000,
                monthly_cost: 10.0,
            },
            Self::Premium => TierLimits {
                storage_bytes: 100 * GIB,
                compute_tokens: 10_000_000,
                monthly_cost: 1000.0,
            },
        }
    }
}

/// Limits granted by a [`QuotaTier`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierLimits {
    /// Storage byte ceiling
    pub storage_bytes: u64,
    /// Compute token ceiling per accounting period
    pub compute_tokens: u64,
    /// Advisory monthly cost ceiling in USD
    pub monthly_cost: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tier_falls_back_to_free() {
        assert_eq!(QuotaTier::from_name("gold"), QuotaTier::Free);
        assert_eq!(QuotaTier::from_name("premium"), QuotaTier::Premium);
    }

    #[test]
    fn premium_is_orders_of_magnitude_larger() {
        let free = QuotaTier::Free.limits();
        let premium = QuotaTier::Premium.limits();
        assert!(premium.storage_bytes >= 100 * free.storage_bytes);
        assert!(premium.compute_tokens >= 100 * free.compute_tokens);
    }
}
