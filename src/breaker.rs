//! Circuit breaker around the external generation dependency.
//!
//! One process-wide circuit per upstream: a string of failures from any
//! caller trips protection for all callers. The breaker wraps the whole
//! retrying operation as a single logical call, so it reacts to
//! sustained failure across retries rather than to individual attempts.
//!
//! State machine: `Closed` → (failures ≥ threshold) → `Open` →
//! (recovery timeout elapsed) → `HalfOpen` → (successes ≥ threshold) →
//! `Closed`, with any failure in `HalfOpen` reopening immediately.
//! While open, [`call`](CircuitBreaker::call) fails fast with
//! [`CircuitOpen`](crate::SkaldError::CircuitOpen) without running the
//! wrapped future.

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::telemetry;
use crate::{Result, SkaldError};

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures before opening the circuit. Default: 5.
    pub failure_threshold: u32,
    /// Time before an open circuit admits a probe call. Default: 60s.
    #[serde(with = "crate::config::duration_secs")]
    pub recovery_timeout: Duration,
    /// Consecutive successes needed to close a half-open circuit.
    /// Default: 2.
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}

impl BreakerConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold.
    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Set the recovery timeout.
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Set the success threshold.
    pub fn success_threshold(mut self, n: u32) -> Self {
        self.success_threshold = n;
        self
    }
}

/// Public view of the circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Stable name used in logs and metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Internal state with per-state bookkeeping.
#[derive(Debug, Clone, Copy)]
enum Inner {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { successes: u32 },
}

/// Diagnostic snapshot of the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitStatus {
    pub state: CircuitState,
    /// Consecutive failures while closed (0 in other states).
    pub failure_count: u32,
    /// Consecutive successes while half-open (0 in other states).
    pub success_count: u32,
    /// Time until an open circuit admits a probe. `None` unless open.
    pub retry_in: Option<Duration>,
}

/// Circuit breaker protecting the single external dependency.
pub struct CircuitBreaker {
    state: RwLock<Inner>,
    config: BreakerConfig,
}

impl CircuitBreaker {
    /// Create a new breaker in the closed state.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            state: RwLock::new(Inner::Closed { failures: 0 }),
            config,
        }
    }

    /// Execute a future under circuit protection.
    ///
    /// Fails fast with [`SkaldError::CircuitOpen`] while the circuit is
    /// open and the recovery timeout has not elapsed; otherwise awaits
    /// the future with no lock held and records its outcome.
    pub async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.admit()?;
        match f.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }

    /// Gate for the next call. Transitions open → half-open once the
    /// recovery timeout has elapsed.
    fn admit(&self) -> Result<()> {
        let opened_at = match *self.state.read() {
            Inner::Open { opened_at } => opened_at,
            _ => return Ok(()),
        };

        let elapsed = opened_at.elapsed();
        if elapsed < self.config.recovery_timeout {
            return Err(SkaldError::CircuitOpen {
                retry_in: self.config.recovery_timeout - elapsed,
            });
        }

        let mut state = self.state.write();
        // Another task may have transitioned while we upgraded the lock.
        if matches!(*state, Inner::Open { .. }) {
            *state = Inner::HalfOpen { successes: 0 };
            info!("circuit transitioning to half-open for recovery probe");
            metrics::counter!(telemetry::CIRCUIT_TRANSITIONS_TOTAL, "state" => "half_open")
                .increment(1);
        }
        Ok(())
    }

    /// Record a successful call outcome.
    pub fn record_success(&self) {
        let mut state = self.state.write();
        match *state {
            Inner::HalfOpen { successes } => {
                if successes + 1 >= self.config.success_threshold {
                    *state = Inner::Closed { failures: 0 };
                    info!("circuit closed after successful recovery");
                    metrics::counter!(telemetry::CIRCUIT_TRANSITIONS_TOTAL, "state" => "closed")
                        .increment(1);
                } else {
                    *state = Inner::HalfOpen {
                        successes: successes + 1,
                    };
                }
            }
            Inner::Closed { .. } => {
                *state = Inner::Closed { failures: 0 };
            }
            Inner::Open { .. } => {}
        }
    }

    /// Record a failed call outcome.
    pub fn record_failure(&self) {
        let mut state = self.state.write();
        match *state {
            Inner::Closed { failures } => {
                if failures + 1 >= self.config.failure_threshold {
                    *state = Inner::Open {
                        opened_at: Instant::now(),
                    };
                    warn!(failures = failures + 1, "circuit opened after repeated failures");
                    metrics::counter!(telemetry::CIRCUIT_TRANSITIONS_TOTAL, "state" => "open")
                        .increment(1);
                } else {
                    *state = Inner::Closed {
                        failures: failures + 1,
                    };
                }
            }
            Inner::HalfOpen { .. } => {
                *state = Inner::Open {
                    opened_at: Instant::now(),
                };
                warn!("circuit reopened after failed recovery probe");
                metrics::counter!(telemetry::CIRCUIT_TRANSITIONS_TOTAL, "state" => "open")
                    .increment(1);
            }
            Inner::Open { .. } => {}
        }
    }

    /// Diagnostic snapshot.
    pub fn status(&self) -> CircuitStatus {
        match *self.state.read() {
            Inner::Closed { failures } => CircuitStatus {
                state: CircuitState::Closed,
                failure_count: failures,
                success_count: 0,
                retry_in: None,
            },
            Inner::Open { opened_at } => CircuitStatus {
                state: CircuitState::Open,
                failure_count: self.config.failure_threshold,
                success_count: 0,
                retry_in: Some(
                    self.config
                        .recovery_timeout
                        .saturating_sub(opened_at.elapsed()),
                ),
            },
            Inner::HalfOpen { successes } => CircuitStatus {
                state: CircuitState::HalfOpen,
                failure_count: 0,
                success_count: successes,
                retry_in: None,
            },
        }
    }

    /// Reset the circuit to closed. Intended for admin surfaces and
    /// test isolation.
    pub fn reset(&self) {
        *self.state.write() = Inner::Closed { failures: 0 };
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failures: u32, recovery: Duration, successes: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            BreakerConfig::new()
                .failure_threshold(failures)
                .recovery_timeout(recovery)
                .success_threshold(successes),
        )
    }

    #[test]
    fn starts_closed() {
        let cb = CircuitBreaker::default();
        assert_eq!(cb.status().state, CircuitState::Closed);
    }

    #[test]
    fn opens_after_failure_threshold() {
        let cb = breaker(3, Duration::from_secs(60), 1);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.status().state, CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.status().state, CircuitState::Open);
    }

    #[test]
    fn success_resets_closed_failure_count() {
        let cb = breaker(3, Duration::from_secs(60), 1);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.status().state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn open_circuit_fails_fast() {
        let cb = breaker(1, Duration::from_secs(60), 1);
        cb.record_failure();

        let mut invoked = false;
        let result = cb
            .call(async {
                invoked = true;
                Ok::<_, SkaldError>("never".to_string())
            })
            .await;

        assert!(matches!(result, Err(SkaldError::CircuitOpen { .. })));
        assert!(!invoked);
    }

    #[tokio::test]
    async fn half_open_after_recovery_then_closes() {
        let cb = breaker(1, Duration::from_millis(10), 2);
        cb.record_failure();
        assert_eq!(cb.status().state, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;

        // First probe transitions to half-open and succeeds.
        let r = cb.call(async { Ok::<_, SkaldError>(1) }).await;
        assert!(r.is_ok());
        assert_eq!(cb.status().state, CircuitState::HalfOpen);

        // Second success closes.
        cb.call(async { Ok::<_, SkaldError>(2) }).await.unwrap();
        assert_eq!(cb.status().state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let cb = breaker(1, Duration::from_millis(10), 2);
        cb.record_failure();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let r = cb
            .call(async { Err::<i32, _>(SkaldError::Timeout) })
            .await;
        assert!(r.is_err());
        assert_eq!(cb.status().state, CircuitState::Open);
    }

    #[test]
    fn reset_closes_circuit() {
        let cb = breaker(1, Duration::from_secs(60), 1);
        cb.record_failure();
        assert_eq!(cb.status().state, CircuitState::Open);
        cb.reset();
        assert_eq!(cb.status().state, CircuitState::Closed);
    }
}
