//! Skald error types

use std::time::Duration;

/// Skald error types
#[derive(Debug, thiserror::Error)]
pub enum SkaldError {
    // Admission control
    #[error("admission denied ({reason}), retry after {retry_after:?}")]
    AdmissionDenied {
        reason: DenyReason,
        retry_after: Duration,
    },

    // Upstream errors
    #[error("upstream call timed out")]
    Timeout,

    #[error("upstream rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("empty response from upstream")]
    EmptyResponse,

    #[error("network error: {0}")]
    Network(String),

    // Protection errors
    #[error("circuit open, retry in {retry_in:?}")]
    CircuitOpen { retry_in: Duration },

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<SkaldError>,
    },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Why admission was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// A per-minute, per-hour, or burst limit was exceeded.
    RateLimit,
    /// A penalty cooldown from an earlier violation is still active.
    Penalty,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::RateLimit => write!(f, "rate_limit"),
            DenyReason::Penalty => write!(f, "penalty"),
        }
    }
}

impl SkaldError {
    /// Whether the error is transient and worth retrying.
    ///
    /// Transient: timeouts, upstream rate limits, empty responses, and
    /// network errors. Everything else is permanent for the duration of
    /// the request — retrying an open circuit or a denied admission
    /// inside the same request only burns budget.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SkaldError::Timeout
                | SkaldError::RateLimited { .. }
                | SkaldError::EmptyResponse
                | SkaldError::Network(_)
        )
    }

    /// Upstream-provided retry hint, if any.
    ///
    /// Only `RateLimited` carries one; the retry loop lets it override
    /// the computed backoff delay.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SkaldError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for skald operations
pub type Result<T> = std::result::Result<T, SkaldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(SkaldError::Timeout.is_transient());
        assert!(SkaldError::RateLimited { retry_after: None }.is_transient());
        assert!(SkaldError::EmptyResponse.is_transient());
        assert!(SkaldError::Network("reset".into()).is_transient());

        assert!(!SkaldError::CircuitOpen {
            retry_in: Duration::from_secs(1)
        }
        .is_transient());
        assert!(!SkaldError::Configuration("bad".into()).is_transient());
        assert!(!SkaldError::AdmissionDenied {
            reason: DenyReason::RateLimit,
            retry_after: Duration::from_secs(1),
        }
        .is_transient());
    }

    #[test]
    fn retry_after_hint_only_on_rate_limited() {
        let hint = Duration::from_secs(5);
        assert_eq!(
            SkaldError::RateLimited {
                retry_after: Some(hint)
            }
            .retry_after(),
            Some(hint)
        );
        assert_eq!(SkaldError::Timeout.retry_after(), None);
    }

    #[test]
    fn deny_reason_display() {
        assert_eq!(DenyReason::RateLimit.to_string(), "rate_limit");
        assert_eq!(DenyReason::Penalty.to_string(), "penalty");
    }
}
