//! Three-state circuit breaker.
//!
//! One breaker instance guards one named external dependency and is
//! shared by every caller in the process. Failures are counted over a
//! rolling window; when the failure ratio over a minimum request count
//! crosses the threshold the breaker opens and calls fail fast without
//! touching the dependency. After a timeout a limited number of probe
//! requests are allowed through; a run of consecutive successes closes
//! the breaker again, and any probe failure re-opens it.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Minimum requests in a window before the failure ratio is evaluated
    pub min_requests: u32,
    /// Failure ratio at or above which the breaker opens
    pub failure_ratio: f64,
    /// Length of the rolling counting window while closed
    pub interval: Duration,
    /// How long the breaker stays open before allowing probes
    pub timeout: Duration,
    /// Consecutive half-open successes required to close
    pub success_threshold: u32,
    /// Maximum concurrent probe requests while half-open
    pub half_open_max_probes: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            min_requests: 10,
            failure_ratio: 0.5,
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(30),
            success_threshold: 2,
            half_open_max_probes: 3,
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    /// Requests flow normally
    Closed,
    /// Requests fail fast without attempting the dependency
    Open,
    /// A limited number of probes test recovery
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half-open",
        };
        f.write_str(name)
    }
}

/// Error surface of a breaker-wrapped call.
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E: std::error::Error> {
    /// The breaker is open; the dependency was not attempted.
    #[error("dependency '{name}' unavailable: circuit breaker open")]
    Open {
        /// Name of the guarded dependency
        name: String,
    },
    /// The wrapped call itself failed.
    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
struct Window {
    started: Instant,
    requests: u32,
    failures: u32,
}

impl Window {
    fn fresh(now: Instant) -> Self {
        Self {
            started: now,
            requests: 0,
            failures: 0,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    window: Window,
    opened_at: Instant,
    half_open_successes: u32,
    half_open_inflight: u32,
}

/// Circuit breaker guarding one named dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a breaker for the named dependency.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let now = Instant::now();
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                window: Window::fresh(now),
                opened_at: now,
                half_open_successes: 0,
                half_open_inflight: 0,
            }),
        }
    }

    /// Current state, re-evaluating the open timeout.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock();
        self.maybe_half_open(&mut inner);
        inner.state
    }

    /// Run `fut` under the breaker.
    ///
    /// When open, returns [`BreakerError::Open`] immediately without
    /// polling `fut`. The breaker lock is never held across the await.
    pub async fn call<T, E, Fut>(&self, fut: Fut) -> Result<T, BreakerError<E>>
    where
        E: std::error::Error,
        Fut: Future<Output = Result<T, E>>,
    {
        self.acquire()?;
        let result = fut.await;
        self.record(result.is_ok());
        result.map_err(BreakerError::Inner)
    }

    fn acquire<E: std::error::Error>(&self) -> Result<(), BreakerError<E>> {
        let mut inner = self.inner.lock();
        self.maybe_half_open(&mut inner);

        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => Err(BreakerError::Open {
                name: self.name.clone(),
            }),
            BreakerState::HalfOpen => {
                if inner.half_open_inflight >= self.config.half_open_max_probes {
                    Err(BreakerError::Open {
                        name: self.name.clone(),
                    })
                } else {
                    inner.half_open_inflight += 1;
                    Ok(())
                }
            }
        }
    }

    fn record(&self, success: bool) {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        match inner.state {
            BreakerState::Closed => {
                if now.duration_since(inner.window.started) >= self.config.interval {
                    inner.window = Window::fresh(now);
                }
                inner.window.requests += 1;
                if !success {
                    inner.window.failures += 1;
                    let ratio = f64::from(inner.window.failures) / f64::from(inner.window.requests);
                    if inner.window.requests >= self.config.min_requests
                        && ratio >= self.config.failure_ratio
                    {
                        self.transition(&mut inner, BreakerState::Open, now);
                    }
                }
            }
            BreakerState::HalfOpen => {
                inner.half_open_inflight = inner.half_open_inflight.saturating_sub(1);
                if success {
                    inner.half_open_successes += 1;
                    if inner.half_open_successes >= self.config.success_threshold {
                        self.transition(&mut inner, BreakerState::Closed, now);
                    }
                } else {
                    self.transition(&mut inner, BreakerState::Open, now);
                }
            }
            // A call admitted before the breaker opened may complete late;
            // its outcome no longer affects the open state.
            BreakerState::Open => {}
        }
    }

    fn maybe_half_open(&self, inner: &mut Inner) {
        if inner.state == BreakerState::Open
            && Instant::now().duration_since(inner.opened_at) >= self.config.timeout
        {
            self.transition(inner, BreakerState::HalfOpen, Instant::now());
        }
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState, now: Instant) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        match to {
            BreakerState::Open => inner.opened_at = now,
            BreakerState::HalfOpen => {
                inner.half_open_successes = 0;
                inner.half_open_inflight = 0;
            }
            BreakerState::Closed => inner.window = Window::fresh(now),
        }
        warn!(
            breaker = %self.name,
            from = %from,
            to = %to,
            "circuit breaker state changed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[derive(Debug, thiserror::Error)]
    #[error("node unreachable")]
    struct Unreachable;

    fn tight_config() -> BreakerConfig {
        BreakerConfig {
            min_requests: 3,
            failure_ratio: 0.6,
            interval: Duration::from_secs(60),
            timeout: Duration::from_millis(100),
            success_threshold: 2,
            half_open_max_probes: 3,
        }
    }

    async fn fail(breaker: &CircuitBreaker) {
        let _ = breaker.call(async { Err::<(), _>(Unreachable) }).await;
    }

    async fn succeed(breaker: &CircuitBreaker) {
        let _ = breaker.call(async { Ok::<_, Unreachable>(()) }).await;
    }

    #[tokio::test]
    async fn stays_closed_below_threshold() {
        let breaker = CircuitBreaker::new("storage", tight_config());
        fail(&breaker).await;
        succeed(&breaker).await;
        succeed(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn opens_after_failure_run_and_fails_fast() {
        let breaker = CircuitBreaker::new("storage", tight_config());
        for _ in 0..3 {
            fail(&breaker).await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        let result = breaker.call(async { Ok::<_, Unreachable>(()) }).await;
        assert_matches!(result, Err(BreakerError::Open { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_after_timeout_then_closes_on_successes() {
        let breaker = CircuitBreaker::new("storage", tight_config());
        for _ in 0..3 {
            fail(&breaker).await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        succeed(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        succeed(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("storage", tight_config());
        for _ in 0..3 {
            fail(&breaker).await;
        }
        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        fail(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
