//! Fixed-window rate limiting
//!
//! Enforces the resolved default policy per client key. Counter storage is
//! pluggable behind [`CounterStore`]: in-process memory by default, Redis
//! when an external storage URL is configured. Both enforce the same
//! semantics - a fixed count of requests per fixed window, with window reset
//! independent per client key.

mod memory;
mod redis;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::config::{RateLimitClause, RateLimitPolicy};

pub use memory::MemoryCounterStore;
pub use redis::RedisCounterStore;

/// Counter state for one (key, window) pair after an increment.
#[derive(Debug, Clone, Copy)]
pub struct WindowCount {
    /// Requests observed in the current window, including this one.
    pub count: u64,
    /// Seconds until the current window rolls over.
    pub reset_after_secs: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rate-limit store connection failed: {0}")]
    Connection(String),

    #[error("rate-limit store operation failed: {0}")]
    Backend(String),
}

/// Storage for per-key fixed-window counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increments the counter for `key` in the current window of
    /// `window_secs` seconds and returns the updated state.
    async fn incr(&self, key: &str, window_secs: u64) -> Result<WindowCount, StoreError>;
}

/// Outcome of a policy check for one client key.
#[derive(Debug, Clone)]
pub enum Decision {
    Allowed,
    Limited {
        /// The clause that rejected the request.
        limit: RateLimitClause,
        retry_after_secs: u64,
    },
}

/// Policy enforcement over a counter store.
pub struct RateLimiter {
    policy: RateLimitPolicy,
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy, store: Arc<dyn CounterStore>) -> Self {
        Self { policy, store }
    }

    pub fn in_memory(policy: RateLimitPolicy) -> Self {
        Self::new(policy, Arc::new(MemoryCounterStore::new()))
    }

    pub async fn with_redis(policy: RateLimitPolicy, url: &str) -> Result<Self, StoreError> {
        let store = RedisCounterStore::connect(url).await?;
        Ok(Self::new(policy, Arc::new(store)))
    }

    /// Checks every clause of the policy against `key`, incrementing windows
    /// as it goes; the first exceeded clause rejects. A counter-store outage
    /// must not amplify into an outage of the API itself, so store errors
    /// log and admit.
    pub async fn check(&self, key: &str) -> Decision {
        for clause in &self.policy.clauses {
            match self.store.incr(key, clause.window.as_secs()).await {
                Ok(window) if window.count > u64::from(clause.count) => {
                    return Decision::Limited {
                        limit: clause.clone(),
                        retry_after_secs: window.reset_after_secs.max(1),
                    };
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "Rate-limit store unavailable; admitting request");
                }
            }
        }
        Decision::Allowed
    }
}

/// Seconds since the Unix epoch; window identity and reset derive from it.
pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateWindow;

    fn policy(count: u32, window: RateWindow) -> RateLimitPolicy {
        RateLimitPolicy {
            clauses: vec![RateLimitClause { count, window }],
        }
    }

    #[tokio::test]
    async fn test_allows_within_limit() {
        let limiter = RateLimiter::in_memory(policy(3, RateWindow::Minute));

        for _ in 0..3 {
            assert!(matches!(limiter.check("10.0.0.1").await, Decision::Allowed));
        }
    }

    #[tokio::test]
    async fn test_rejects_over_limit_with_retry_after() {
        let limiter = RateLimiter::in_memory(policy(2, RateWindow::Minute));

        limiter.check("10.0.0.1").await;
        limiter.check("10.0.0.1").await;

        match limiter.check("10.0.0.1").await {
            Decision::Limited {
                limit,
                retry_after_secs,
            } => {
                assert_eq!(limit.count, 2);
                assert!(retry_after_secs >= 1 && retry_after_secs <= 60);
            }
            Decision::Allowed => panic!("third request should be limited"),
        }
    }

    #[tokio::test]
    async fn test_windows_reset_independently_per_key() {
        let limiter = RateLimiter::in_memory(policy(1, RateWindow::Minute));

        assert!(matches!(limiter.check("10.0.0.1").await, Decision::Allowed));
        assert!(matches!(
            limiter.check("10.0.0.1").await,
            Decision::Limited { .. }
        ));
        // A different client key has its own window.
        assert!(matches!(limiter.check("10.0.0.2").await, Decision::Allowed));
    }

    #[tokio::test]
    async fn test_multi_clause_policy_enforces_tightest() {
        let limiter = RateLimiter::in_memory(RateLimitPolicy {
            clauses: vec![
                RateLimitClause {
                    count: 100,
                    window: RateWindow::Day,
                },
                RateLimitClause {
                    count: 1,
                    window: RateWindow::Minute,
                },
            ],
        });

        assert!(matches!(limiter.check("10.0.0.1").await, Decision::Allowed));
        match limiter.check("10.0.0.1").await {
            Decision::Limited { limit, .. } => assert_eq!(limit.window, RateWindow::Minute),
            Decision::Allowed => panic!("minute clause should reject"),
        }
    }

    #[tokio::test]
    async fn test_window_rollover_admits_again() {
        let limiter = RateLimiter::in_memory(policy(1, RateWindow::Second));

        assert!(matches!(limiter.check("10.0.0.1").await, Decision::Allowed));
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        assert!(matches!(limiter.check("10.0.0.1").await, Decision::Allowed));
    }
}
