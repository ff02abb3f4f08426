//! Telemetry metric name constants.
//!
//! Centralised metric names for skald operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `skald_`. Counters end in `_total`,
//! monetary gauges use explicit units (e.g. `_usd`).
//!
//! # Common labels
//!
//! - `path` — how a response was produced: "cache", "template", "live",
//!   "fallback"
//! - `reason` — denial or fallback cause (e.g. "rate_limit", "penalty",
//!   "circuit_open")
//! - `state` — circuit state after a transition: "closed", "open",
//!   "half_open"

/// Total requests entering the pipeline.
///
/// Labels: `path` ("cache" | "template" | "live" | "fallback" | "denied").
pub const REQUESTS_TOTAL: &str = "skald_requests_total";

/// Total admissions denied by the rate limiter.
///
/// Labels: `reason` ("rate_limit" | "penalty").
pub const ADMISSION_DENIED_TOTAL: &str = "skald_admission_denied_total";

/// Total retry attempts (not counting the initial request).
pub const RETRIES_TOTAL: &str = "skald_retries_total";

/// Total response cache hits.
pub const CACHE_HITS_TOTAL: &str = "skald_cache_hits_total";

/// Total response cache misses.
pub const CACHE_MISSES_TOTAL: &str = "skald_cache_misses_total";

/// Total cache entries evicted (TTL expiry or capacity pressure).
///
/// Labels: `reason` ("expired" | "capacity").
pub const CACHE_EVICTIONS_TOTAL: &str = "skald_cache_evictions_total";

/// Total circuit state transitions.
///
/// Labels: `state` ("closed" | "open" | "half_open").
pub const CIRCUIT_TRANSITIONS_TOTAL: &str = "skald_circuit_transitions_total";

/// Total live-path failures degraded to the template fallback chain.
///
/// Labels: `reason` ("circuit_open" | "retries_exhausted" | "upstream").
pub const FALLBACKS_TOTAL: &str = "skald_fallbacks_total";

/// Estimated upstream spend avoided by cache hits, in USD. Gauge,
/// updated on every hit.
pub const COST_SAVED_USD: &str = "skald_cost_saved_usd";
