//! Per-caller admission control.
//!
//! [`RateLimiter`] enforces three independent limits per caller: a
//! per-minute count, a per-hour count, and a burst limit (N requests
//! inside a short sub-window). Exceeding any of them starts a fixed
//! penalty cooldown that is sticky — it keeps the caller blocked even
//! after the minute window would have rolled over.
//!
//! `check()` is a dry-run: it never consumes budget, so admission can
//! be probed before committing. `record()` counts an admitted request.
//! Callers are tracked lazily in a [`DashMap`], so unrelated callers
//! never contend on a shared lock, and reaped after 24h idle via
//! [`RateLimiter::sweep_idle`].

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::DenyReason;
use crate::telemetry;

/// Configuration for per-caller admission control.
///
/// ```rust
/// # use skald::RateLimitConfig;
/// # use std::time::Duration;
/// let config = RateLimitConfig::new()
///     .requests_per_minute(20)
///     .burst_limit(5)
///     .penalty(Duration::from_secs(120));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per rolling minute. Default: 20.
    pub requests_per_minute: u32,
    /// Requests allowed per rolling hour. Default: 200.
    pub requests_per_hour: u32,
    /// Requests allowed inside the burst sub-window. Default: 5.
    pub burst_limit: u32,
    /// Length of the "minute" window. Default: 60s. Shortened in tests
    /// to exercise window rollover without wall-clock waits.
    #[serde(with = "crate::config::duration_secs")]
    pub minute_window: Duration,
    /// Length of the "hour" window. Default: 3600s.
    #[serde(with = "crate::config::duration_secs")]
    pub hour_window: Duration,
    /// Length of the burst sub-window. Default: 10s.
    #[serde(with = "crate::config::duration_secs")]
    pub burst_window: Duration,
    /// Penalty cooldown applied after any limit is exceeded. Default: 120s.
    #[serde(with = "crate::config::duration_secs")]
    pub penalty: Duration,
    /// Idle time after which a caller's window is reaped. Default: 24h.
    #[serde(with = "crate::config::duration_secs")]
    pub idle_expiry: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 20,
            requests_per_hour: 200,
            burst_limit: 5,
            minute_window: Duration::from_secs(60),
            hour_window: Duration::from_secs(3600),
            burst_window: Duration::from_secs(10),
            penalty: Duration::from_secs(120),
            idle_expiry: Duration::from_secs(24 * 3600),
        }
    }
}

impl RateLimitConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-minute limit.
    pub fn requests_per_minute(mut self, n: u32) -> Self {
        self.requests_per_minute = n;
        self
    }

    /// Set the per-hour limit.
    pub fn requests_per_hour(mut self, n: u32) -> Self {
        self.requests_per_hour = n;
        self
    }

    /// Set the burst limit.
    pub fn burst_limit(mut self, n: u32) -> Self {
        self.burst_limit = n;
        self
    }

    /// Set the "minute" window length.
    pub fn minute_window(mut self, window: Duration) -> Self {
        self.minute_window = window;
        self
    }

    /// Set the "hour" window length.
    pub fn hour_window(mut self, window: Duration) -> Self {
        self.hour_window = window;
        self
    }

    /// Set the burst sub-window length.
    pub fn burst_window(mut self, window: Duration) -> Self {
        self.burst_window = window;
        self
    }

    /// Set the penalty cooldown duration.
    pub fn penalty(mut self, penalty: Duration) -> Self {
        self.penalty = penalty;
        self
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub reason: Option<DenyReason>,
    /// Estimate of when the caller may try again. `None` when allowed.
    pub retry_after: Option<Duration>,
}

impl Admission {
    fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            retry_after: None,
        }
    }

    fn denied(reason: DenyReason, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            retry_after: Some(retry_after),
        }
    }
}

/// Diagnostic snapshot for one caller, exposed to admin surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub minute_used: u32,
    pub minute_limit: u32,
    pub hour_used: u32,
    pub hour_limit: u32,
    pub burst_used: u32,
    pub burst_limit: u32,
    pub penalty_remaining: Option<Duration>,
}

/// Per-caller sliding-window state. One entry per caller, created
/// lazily on first contact.
#[derive(Debug)]
struct CallerWindow {
    minute_start: Instant,
    minute_count: u32,
    hour_start: Instant,
    hour_count: u32,
    /// Timestamps of recent requests inside the burst sub-window.
    burst: Vec<Instant>,
    penalty_until: Option<Instant>,
    last_seen: Instant,
}

impl CallerWindow {
    fn new(now: Instant) -> Self {
        Self {
            minute_start: now,
            minute_count: 0,
            hour_start: now,
            hour_count: 0,
            burst: Vec::new(),
            penalty_until: None,
            last_seen: now,
        }
    }

    /// Roll expired windows and drop burst timestamps outside the
    /// sub-window. Penalty state is deliberately untouched, so a
    /// penalty outlives the window reset that would otherwise free the
    /// caller.
    fn roll(&mut self, now: Instant, config: &RateLimitConfig) {
        if now.duration_since(self.minute_start) >= config.minute_window {
            self.minute_start = now;
            self.minute_count = 0;
        }
        if now.duration_since(self.hour_start) >= config.hour_window {
            self.hour_start = now;
            self.hour_count = 0;
        }
        self.burst.retain(|t| now.duration_since(*t) < config.burst_window);
    }

    fn penalty_remaining(&self, now: Instant) -> Option<Duration> {
        self.penalty_until
            .map(|until| until.saturating_duration_since(now))
            .filter(|remaining| !remaining.is_zero())
    }
}

/// Per-caller admission control with sliding windows, burst detection,
/// and sticky penalties.
pub struct RateLimiter {
    windows: DashMap<String, CallerWindow>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    /// Check whether a caller may proceed, without consuming budget.
    ///
    /// Denials start (or extend observation of) the penalty cooldown:
    /// seeing a caller at its limit is the violation, whether or not the
    /// request is then made. The returned `retry_after` is the later of
    /// the window rollover and the penalty expiry.
    pub fn check(&self, caller_id: &str) -> Admission {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(caller_id.to_string())
            .or_insert_with(|| CallerWindow::new(now));
        let window = entry.value_mut();
        window.roll(now, &self.config);
        window.last_seen = now;

        if let Some(remaining) = window.penalty_remaining(now) {
            metrics::counter!(telemetry::ADMISSION_DENIED_TOTAL, "reason" => "penalty")
                .increment(1);
            return Admission::denied(DenyReason::Penalty, remaining);
        }
        window.penalty_until = None;

        let violation = if window.burst.len() as u32 >= self.config.burst_limit {
            // Burst trips even when the minute budget still has room.
            // The slot opens when the oldest timestamp leaves the
            // sub-window, not after a whole fresh window.
            let oldest = window.burst.first().copied().unwrap_or(now);
            Some(
                self.config
                    .burst_window
                    .saturating_sub(now.duration_since(oldest)),
            )
        } else if window.minute_count >= self.config.requests_per_minute {
            let window_left = self
                .config
                .minute_window
                .saturating_sub(now.duration_since(window.minute_start));
            Some(window_left)
        } else if window.hour_count >= self.config.requests_per_hour {
            let window_left = self
                .config
                .hour_window
                .saturating_sub(now.duration_since(window.hour_start));
            Some(window_left)
        } else {
            None
        };

        match violation {
            Some(window_left) => {
                window.penalty_until = Some(now + self.config.penalty);
                let retry_after = window_left.max(self.config.penalty);
                warn!(
                    caller = caller_id,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "rate limit exceeded, penalty started"
                );
                metrics::counter!(telemetry::ADMISSION_DENIED_TOTAL, "reason" => "rate_limit")
                    .increment(1);
                Admission::denied(DenyReason::RateLimit, retry_after)
            }
            None => Admission::allowed(),
        }
    }

    /// Count an admitted request against the caller's windows.
    pub fn record(&self, caller_id: &str) {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(caller_id.to_string())
            .or_insert_with(|| CallerWindow::new(now));
        let window = entry.value_mut();
        window.roll(now, &self.config);
        window.minute_count += 1;
        window.hour_count += 1;
        window.burst.push(now);
        window.last_seen = now;
    }

    /// Diagnostic snapshot for one caller.
    ///
    /// Callers never seen (or already reaped) report empty windows.
    pub fn info(&self, caller_id: &str) -> RateLimitInfo {
        let now = Instant::now();
        let (minute_used, hour_used, burst_used, penalty_remaining) = self
            .windows
            .get_mut(caller_id)
            .map(|mut entry| {
                let window = entry.value_mut();
                window.roll(now, &self.config);
                (
                    window.minute_count,
                    window.hour_count,
                    window.burst.len() as u32,
                    window.penalty_remaining(now),
                )
            })
            .unwrap_or((0, 0, 0, None));

        RateLimitInfo {
            minute_used,
            minute_limit: self.config.requests_per_minute,
            hour_used,
            hour_limit: self.config.requests_per_hour,
            burst_used,
            burst_limit: self.config.burst_limit,
            penalty_remaining,
        }
    }

    /// Remove callers idle longer than the configured expiry.
    ///
    /// Safe to run concurrently with checks; `DashMap::retain` locks one
    /// shard at a time.
    pub fn sweep_idle(&self) {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now.duration_since(window.last_seen) < self.config.idle_expiry);
        let reaped = before.saturating_sub(self.windows.len());
        if reaped > 0 {
            debug!(reaped, "reaped idle caller windows");
        }
    }

    /// Number of callers currently tracked.
    pub fn tracked_callers(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(per_minute: u32, burst: u32) -> RateLimiter {
        RateLimiter::new(
            RateLimitConfig::new()
                .requests_per_minute(per_minute)
                .requests_per_hour(1000)
                .burst_limit(burst)
                .burst_window(Duration::from_secs(10))
                .penalty(Duration::from_millis(50)),
        )
    }

    #[test]
    fn allows_until_minute_limit() {
        let limiter = limiter(3, 100);
        for _ in 0..3 {
            assert!(limiter.check("alice").allowed);
            limiter.record("alice");
        }
        let admission = limiter.check("alice");
        assert!(!admission.allowed);
        assert_eq!(admission.reason, Some(DenyReason::RateLimit));
        assert!(admission.retry_after.is_some());
    }

    #[test]
    fn check_is_dry_run() {
        let limiter = limiter(2, 100);
        // Repeated checks without record never consume budget.
        for _ in 0..10 {
            assert!(limiter.check("bob").allowed);
        }
        limiter.record("bob");
        assert!(limiter.check("bob").allowed);
    }

    #[test]
    fn burst_trips_before_minute_budget() {
        // 5 per minute but only 3 in the burst sub-window.
        let limiter = limiter(5, 3);
        for _ in 0..3 {
            assert!(limiter.check("carol").allowed);
            limiter.record("carol");
        }
        let admission = limiter.check("carol");
        assert!(!admission.allowed);
        assert_eq!(admission.reason, Some(DenyReason::RateLimit));
        assert!(limiter.info("carol").minute_used < 5);
    }

    #[test]
    fn hour_limit_trips_with_minute_budget_left() {
        let limiter = RateLimiter::new(
            RateLimitConfig::new()
                .requests_per_minute(100)
                .requests_per_hour(2)
                .burst_limit(100),
        );
        for _ in 0..2 {
            assert!(limiter.check("hank").allowed);
            limiter.record("hank");
        }
        let admission = limiter.check("hank");
        assert!(!admission.allowed);
        assert_eq!(admission.reason, Some(DenyReason::RateLimit));
        let info = limiter.info("hank");
        assert!(info.minute_used < info.minute_limit);
        assert_eq!(info.hour_used, info.hour_limit);
    }

    #[test]
    fn penalty_outlives_minute_window_reset() {
        let limiter = RateLimiter::new(
            RateLimitConfig::new()
                .requests_per_minute(1)
                .minute_window(Duration::from_millis(30))
                .burst_limit(100)
                .penalty(Duration::from_secs(10)),
        );
        limiter.record("ivy");
        let first = limiter.check("ivy");
        assert!(!first.allowed);
        assert_eq!(first.reason, Some(DenyReason::RateLimit));

        // The minute window rolls over, but the penalty holds.
        std::thread::sleep(Duration::from_millis(50));
        let after_roll = limiter.check("ivy");
        assert!(!after_roll.allowed);
        assert_eq!(after_roll.reason, Some(DenyReason::Penalty));
        assert_eq!(limiter.info("ivy").minute_used, 0);
    }

    #[test]
    fn burst_retry_after_counts_down() {
        let limiter = RateLimiter::new(
            RateLimitConfig::new()
                .requests_per_minute(100)
                .burst_limit(1)
                .burst_window(Duration::from_millis(500))
                .penalty(Duration::from_millis(1)),
        );
        limiter.record("judy");
        std::thread::sleep(Duration::from_millis(100));

        // The oldest burst timestamp leaves the sub-window in <= 400ms,
        // so the estimate must not claim the full window.
        let admission = limiter.check("judy");
        assert!(!admission.allowed);
        assert!(admission.retry_after.unwrap() <= Duration::from_millis(400));
    }

    #[test]
    fn penalty_is_reported_on_subsequent_checks() {
        let limiter = limiter(1, 100);
        limiter.record("dave");
        assert!(!limiter.check("dave").allowed); // starts the penalty
        let again = limiter.check("dave");
        assert!(!again.allowed);
        assert_eq!(again.reason, Some(DenyReason::Penalty));
    }

    #[test]
    fn penalty_elapses() {
        let limiter = RateLimiter::new(
            RateLimitConfig::new()
                .requests_per_minute(100)
                .burst_limit(1)
                .burst_window(Duration::from_millis(20))
                .penalty(Duration::from_millis(20)),
        );
        limiter.record("erin");
        assert!(!limiter.check("erin").allowed);
        std::thread::sleep(Duration::from_millis(40));
        // Burst window and penalty have both elapsed.
        assert!(limiter.check("erin").allowed);
    }

    #[test]
    fn callers_are_independent() {
        let limiter = limiter(1, 100);
        limiter.record("frank");
        assert!(!limiter.check("frank").allowed);
        assert!(limiter.check("grace").allowed);
    }

    #[test]
    fn sweep_reaps_idle_callers() {
        let limiter = RateLimiter::new(RateLimitConfig {
            idle_expiry: Duration::from_millis(10),
            ..RateLimitConfig::default()
        });
        limiter.record("heidi");
        assert_eq!(limiter.tracked_callers(), 1);
        std::thread::sleep(Duration::from_millis(20));
        limiter.sweep_idle();
        assert_eq!(limiter.tracked_callers(), 0);
    }

    #[test]
    fn unknown_caller_info_is_empty() {
        let limiter = limiter(5, 5);
        let info = limiter.info("nobody");
        assert_eq!(info.minute_used, 0);
        assert_eq!(info.minute_limit, 5);
        assert!(info.penalty_remaining.is_none());
    }
}
