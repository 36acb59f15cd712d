//! Timeout and retry policy around individual metric queries

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AnalyticsConfig;
use crate::error::StatsError;

/// Bounds every sub-query of a stats computation
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }
}

impl FetchPolicy {
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self {
            timeout: config.query_timeout(),
            max_attempts: config.max_attempts.max(1),
            base_delay: config.retry_base_delay(),
        }
    }

    /// Exponential backoff with up to 50% jitter
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let jitter_ms = base.as_millis() as u64 / 2;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };
        base + Duration::from_millis(jitter)
    }

    /// Run `operation` until it succeeds, each attempt bounded by the timeout.
    /// Exhausting the attempts yields `SourceUnavailable` for `query`.
    pub async fn run<F, Fut, T>(&self, query: &'static str, mut operation: F) -> Result<T, StatsError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut reason = String::new();

        for attempt in 0..attempts {
            match tokio::time::timeout(self.timeout, operation()).await {
                Ok(Ok(value)) => {
                    if attempt > 0 {
                        debug!(query, attempt = attempt + 1, "Metric query succeeded after retry");
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => reason = e.to_string(),
                Err(_) => reason = format!("timed out after {}ms", self.timeout.as_millis()),
            }

            if attempt + 1 < attempts {
                let delay = self.delay_for_attempt(attempt);
                warn!(
                    query,
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    error = %reason,
                    delay_ms = delay.as_millis() as u64,
                    "Metric query failed, retrying"
                );
                tokio::time::sleep(delay).await;
            } else {
                warn!(query, attempts, error = %reason, "Metric query failed, giving up");
            }
        }

        Err(StatsError::SourceUnavailable { query, reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32, timeout_ms: u64) -> FetchPolicy {
        FetchPolicy {
            timeout: Duration::from_millis(timeout_ms),
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = policy(3, 1000)
            .run("live_stats", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(42)
            })
            .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = policy(3, 1000)
            .run("peak_hour", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("database is locked");
                }
                Ok(7)
            })
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, _> = policy(2, 1000)
            .run("peak_day", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("connection refused")
            })
            .await;
        assert_eq!(
            result,
            Err(StatsError::SourceUnavailable {
                query: "peak_day",
                reason: "connection refused".to_string()
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_queries_time_out() {
        let result: Result<i32, _> = policy(1, 20)
            .run("hourly_range", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            })
            .await;
        match result {
            Err(StatsError::SourceUnavailable { query, reason }) => {
                assert_eq!(query, "hourly_range");
                assert!(reason.contains("timed out"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn backoff_grows_with_attempts() {
        let policy = FetchPolicy {
            timeout: Duration::from_secs(1),
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        };
        let first = policy.delay_for_attempt(0);
        let second = policy.delay_for_attempt(1);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(150));
        assert!(second >= Duration::from_millis(200) && second <= Duration::from_millis(300));
    }
}
