//! Bounded retry with exponential backoff for idempotent GET requests.
//!
//! Only transport failures and HTTP 429/500/502/503/504 are retried. Any other
//! status is handed back to the caller untouched.

use anyhow::{Context, Result};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::{Duration, Instant};
use verdant_utils::SourcesConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SourcesConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Never retries; used by the health check.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based): base * 2^(retry-1), capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SourcesConfig::default())
    }
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// Sends the request built by `build` until it succeeds, fails permanently, or retries run out.
///
/// `build` is called once per attempt because a `RequestBuilder` is consumed by `send`.
pub async fn send_with_retry<F>(label: &str, policy: RetryPolicy, mut build: F) -> Result<Response>
where
    F: FnMut() -> RequestBuilder,
{
    let start_time = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let retries_left = attempt <= policy.max_retries;

        match build().send().await {
            Ok(response) if retries_left && is_retryable_status(response.status()) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    endpoint = label,
                    attempt,
                    status = response.status().as_u16(),
                    backoff_ms = delay.as_millis() as u64,
                    "Retryable status from upstream, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Ok(response) => {
                if attempt > 1 {
                    tracing::debug!(
                        endpoint = label,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Request completed after retry"
                    );
                }
                return Ok(response);
            }
            Err(err) if retries_left && !err.is_builder() => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    endpoint = label,
                    attempt,
                    error = %err,
                    backoff_ms = delay.as_millis() as u64,
                    "Transport error, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!(
                        "request to {} failed after {} attempt(s) in {} ms",
                        label,
                        attempt,
                        start_time.elapsed().as_millis()
                    )
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for(10), Duration::from_secs(8));
    }

    #[test]
    fn test_retryable_statuses() {
        for code in [429u16, 500, 502, 503, 504] {
            assert!(is_retryable_status(StatusCode::from_u16(code).unwrap()));
        }
        for code in [200u16, 400, 401, 404, 501] {
            assert!(!is_retryable_status(StatusCode::from_u16(code).unwrap()));
        }
    }
}
