//! Retry configuration, delay calculation, and the shared retry loop.
//!
//! Provides [`RetryConfig`] for controlling retry behaviour and
//! [`with_retry()`] which wraps an async operation with automatic
//! retry on transient errors.
//!
//! Delay for attempt *i* is `initial_delay * 2^i`, capped at
//! `max_delay`, then ± up to 10% uniform jitter when enabled. An
//! upstream `retry_after` hint overrides the computed delay.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::telemetry;
use crate::{Result, SkaldError};

/// Maximum jitter as a fraction of the computed delay.
const JITTER_FRACTION: f64 = 0.1;

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff with optional jitter:
///
/// ```rust
/// # use skald::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200))
///     .jitter(true);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 500ms.
    #[serde(with = "crate::config::duration_millis")]
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 30s.
    #[serde(with = "crate::config::duration_millis")]
    pub max_delay: Duration,
    /// Whether to add random jitter to delays. Default: true.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter.
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// Exponential backoff: `initial_delay * 2^attempt`, capped at
    /// `max_delay`. Monotonically non-decreasing in `attempt`. Does NOT
    /// include jitter — see [`jittered_delay()`](Self::jittered_delay).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Apply ± up to 10% uniform jitter to the computed delay.
    ///
    /// Always ≥ 0. A no-op when jitter is disabled.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let spread = base.as_secs_f64() * JITTER_FRACTION;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::try_from_secs_f64((base.as_secs_f64() + offset).max(0.0)).unwrap_or(base)
    }

    /// Calculate the effective delay, respecting upstream `retry_after`
    /// hints. A hint from a `RateLimited` error takes precedence over
    /// the computed backoff.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.jittered_delay(attempt))
    }
}

/// Execute an async operation with retry logic.
///
/// Retries on transient errors (as classified by
/// [`SkaldError::is_transient()`]) up to `config.max_attempts`, using
/// exponential backoff and respecting `retry_after` hints. Permanent
/// errors are returned immediately without retry. Once attempts are
/// exhausted the last observed error is returned wrapped in
/// [`SkaldError::RetriesExhausted`].
///
/// The backoff sleep suspends only the calling task and is one of the
/// pipeline's two suspension points; no limiter or cache lock is held
/// here.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: &str, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..config.max_attempts {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => {
                metrics::counter!(telemetry::RETRIES_TOTAL).increment(1);
                if attempt + 1 < config.max_attempts {
                    let delay = config.effective_delay(attempt, e.retry_after());
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e), // permanent error, no retry
        }
    }
    Err(SkaldError::RetriesExhausted {
        attempts: config.max_attempts,
        last: Box::new(last_err.unwrap_or(SkaldError::EmptyResponse)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_until_cap() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(500))
            .jitter(false);

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(10), Duration::from_millis(500));
    }

    #[test]
    fn delay_is_monotone_non_decreasing() {
        let config = RetryConfig::default();
        let mut prev = Duration::ZERO;
        for attempt in 0..16 {
            let d = config.delay_for_attempt(attempt);
            assert!(d >= prev);
            prev = d;
        }
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(1000))
            .jitter(true);
        for _ in 0..100 {
            let d = config.jittered_delay(0);
            assert!(d >= Duration::from_millis(900));
            assert!(d <= Duration::from_millis(1100));
        }
    }

    #[test]
    fn jitter_disabled_is_exact() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(250))
            .jitter(false);
        assert_eq!(config.jittered_delay(0), Duration::from_millis(250));
    }

    #[test]
    fn retry_after_hint_overrides_backoff() {
        let config = RetryConfig::new().jitter(false);
        let hint = Duration::from_millis(1234);
        assert_eq!(config.effective_delay(0, Some(hint)), hint);
    }

    #[tokio::test]
    async fn exhaustion_wraps_last_error() {
        let config = RetryConfig::new()
            .max_attempts(2)
            .initial_delay(Duration::from_millis(1))
            .jitter(false);

        let result: Result<()> =
            with_retry(&config, "test", || async { Err(SkaldError::Timeout) }).await;

        match result {
            Err(SkaldError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, SkaldError::Timeout));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn permanent_error_not_retried() {
        let config = RetryConfig::new()
            .max_attempts(5)
            .initial_delay(Duration::from_millis(1));

        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: Result<()> = with_retry(&config, "test", || {
            calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            async { Err(SkaldError::Configuration("bad".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 1);
    }
}
