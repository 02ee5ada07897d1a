//! Automatic retry with exponential backoff and jitter.
//!
//! [`retry_call`] wraps any async operation. Errors that report themselves
//! as transient through [`Retryable`] are retried up to
//! [`RetryConfig::max_retries`] times; every other error is returned
//! immediately.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (0 = no retries, just fail immediately).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries, before jitter.
    pub max_delay: Duration,
    /// Backoff multiplier (typically 2.0 for exponential backoff).
    pub multiplier: f64,
    /// Upper bound of the uniform random delay added to each backoff.
    /// `Duration::ZERO` disables jitter.
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: Duration::from_millis(500),
        }
    }
}

impl RetryConfig {
    /// Create a config with the given number of retries. Uses sensible defaults.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// Backoff used against the document service: four retries starting at
    /// one second, up to one second of jitter.
    pub fn document_service() -> Self {
        Self {
            max_retries: 4,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
            multiplier: 2.0,
            jitter: Duration::from_secs(1),
        }
    }

    /// Deterministic part of the delay for a given attempt (0-indexed).
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }

    /// Calculate the delay for a given attempt: capped exponential backoff
    /// plus a uniform random amount in `[0, jitter)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for_attempt(attempt);
        if self.jitter.is_zero() {
            return base;
        }
        let extra = rand::rng().random::<f64>() * self.jitter.as_secs_f64();
        base + Duration::from_secs_f64(extra)
    }
}

/// Errors that know whether they are worth retrying.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for String {
    fn is_transient(&self) -> bool {
        is_transient_error(self) && !is_permanent_error(self)
    }
}

/// Whether an error string indicates a transient (retryable) failure.
pub fn is_transient_error(error: &str) -> bool {
    let transient_statuses = ["429", "500", "502", "503", "504"];
    if transient_statuses
        .iter()
        .any(|s| error.contains(&format!("HTTP {s}")))
    {
        return true;
    }

    let lower = error.to_lowercase();
    [
        "request failed:",
        "connection reset",
        "connection refused",
        "timed out",
        "timeout",
        "broken pipe",
        "network",
    ]
    .iter()
    .any(|p| lower.contains(p))
}

/// Whether an error is a permanent (non-retryable) failure.
pub fn is_permanent_error(error: &str) -> bool {
    [
        "HTTP 400",
        "HTTP 401",
        "HTTP 403",
        "HTTP 404",
        "HTTP 422",
        "invalid",
        "bad request",
        "unauthorized",
    ]
    .iter()
    .any(|p| error.contains(p))
}

/// Retry an async call with exponential backoff for transient errors.
///
/// `label` names the operation in log lines.
pub async fn retry_call<T, E, F, Fut>(
    config: &RetryConfig,
    label: &str,
    mut call: F,
) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < config.max_retries && e.is_transient() => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "{label}: transient error (attempt {}/{}): {e}. Retrying in {delay:?}...",
                    attempt + 1,
                    config.max_retries,
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocsError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(retries: u32) -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: Duration::ZERO,
            ..RetryConfig::with_retries(retries)
        }
    }

    #[test]
    fn default_config_no_retries() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn delay_increases_exponentially() {
        let config = RetryConfig {
            jitter: Duration::ZERO,
            ..RetryConfig::with_retries(5)
        };
        let d0 = config.delay_for_attempt(0);
        let d1 = config.delay_for_attempt(1);
        let d2 = config.delay_for_attempt(2);

        assert!(d1 > d0, "d1={d1:?} should be > d0={d0:?}");
        assert!(d2 > d1, "d2={d2:?} should be > d1={d1:?}");
    }

    #[test]
    fn delay_capped_at_max() {
        let config = RetryConfig {
            jitter: Duration::ZERO,
            max_delay: Duration::from_secs(2),
            ..RetryConfig::with_retries(10)
        };
        assert!(config.delay_for_attempt(10) <= Duration::from_secs(2));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let config = RetryConfig::document_service();
        for attempt in 0..4 {
            let base = config.base_delay_for_attempt(attempt);
            let d = config.delay_for_attempt(attempt);
            assert!(d >= base);
            assert!(d < base + config.jitter);
        }
    }

    #[test]
    fn transient_errors_detected() {
        assert!(is_transient_error("OpenRouter API HTTP 429: rate limited"));
        assert!(is_transient_error("OpenRouter API HTTP 502: bad gateway"));
        assert!(is_transient_error("request failed: connection reset"));
        assert!(!is_transient_error("OpenRouter API HTTP 400: bad request"));
        assert!(is_permanent_error("OpenRouter API HTTP 401: unauthorized"));
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, DocsError> = retry_call(&fast(3), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(DocsError::Busy {
                        status: 429,
                        message: "slow down".into(),
                    })
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), DocsError> = retry_call(&fast(2), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(DocsError::Busy {
                    status: 503,
                    message: "busy".into(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(DocsError::Busy { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), DocsError> = retry_call(&fast(5), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DocsError::AuthRevoked("invalid_grant".into())) }
        })
        .await;
        assert!(matches!(result, Err(DocsError::AuthRevoked(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
