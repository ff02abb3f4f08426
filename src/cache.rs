//! Key-addressed response cache with TTL and value-aware eviction.
//!
//! [`ResponseCache`] stores generated responses keyed on a content hash
//! of (normalized request text, content mode, caller tier). Entries
//! expire after a TTL (default one week) and are evicted lazily on
//! access plus via a periodic [`sweep_expired`](ResponseCache::sweep_expired).
//!
//! Eviction under capacity pressure is value-aware rather than pure
//! LRU: the entry with the lowest `(hit_count, quality_score)` tuple
//! goes first, so popular, well-rated responses survive longer than
//! recency alone would allow. This is why the cache is hand-rolled on a
//! [`DashMap`] instead of an off-the-shelf LRU — no stock policy orders
//! eviction by that tuple.
//!
//! Hit/miss/eviction counters are plain atomics, mirrored to the
//! `metrics` facade; `cost_saved` is hits × a per-call cost constant,
//! for reporting how much upstream spend the cache avoided.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::telemetry;
use crate::types::{CallerTier, ContentMode};

/// Configuration for the response cache.
///
/// ```rust
/// # use skald::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(50_000)
///     .ttl(Duration::from_secs(24 * 3600));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 10,000.
    pub max_entries: usize,
    /// Time-to-live for cached entries. Default: 7 days.
    #[serde(with = "crate::config::duration_secs")]
    pub ttl: Duration,
    /// Estimated upstream cost of one generation, used for the
    /// cost-saved figure. Default: $0.002.
    pub per_call_cost_usd: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(7 * 24 * 3600),
            per_call_cost_usd: 0.002,
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the per-call cost constant for the cost-saved figure.
    pub fn per_call_cost_usd(mut self, usd: f64) -> Self {
        self.per_call_cost_usd = usd;
        self
    }
}

/// One cached response.
#[derive(Debug, Clone)]
struct CacheEntry {
    text: String,
    created_at: Instant,
    ttl: Duration,
    hit_count: u64,
    quality_score: f32,
}

impl CacheEntry {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) >= self.ttl
    }
}

/// Read-only cache statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    /// Estimated upstream spend avoided, `hits × per_call_cost_usd`.
    pub cost_saved_usd: f64,
}

/// In-memory response cache with TTL and weighted eviction.
pub struct ResponseCache {
    entries: DashMap<u64, CacheEntry>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResponseCache {
    /// Create a new response cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a cached response.
    ///
    /// Expired entries are dropped on access. A hit bumps the entry's
    /// `hit_count`, improving its survival under capacity pressure.
    pub fn get(&self, key: u64) -> Option<String> {
        let now = Instant::now();
        // The shard guard from get_mut must drop before remove().
        let (hit, expired) = match self.entries.get_mut(&key) {
            Some(mut entry) if !entry.expired(now) => {
                entry.hit_count += 1;
                (Some(entry.text.clone()), false)
            }
            Some(_) => (None, true),
            None => (None, false),
        };

        if expired {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => "expired")
                .increment(1);
        }

        match hit {
            Some(text) => {
                let hits = self.hits.fetch_add(1, Ordering::Relaxed) + 1;
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                metrics::gauge!(telemetry::COST_SAVED_USD)
                    .set(hits as f64 * self.config.per_call_cost_usd);
                Some(text)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
        }
    }

    /// Insert a response with the default TTL.
    pub fn insert(&self, key: u64, text: impl Into<String>, quality_score: f32) {
        self.insert_with_ttl(key, text, quality_score, self.config.ttl);
    }

    /// Insert a response with an explicit TTL.
    ///
    /// At capacity, the entry with the lowest `(hit_count,
    /// quality_score)` tuple is evicted to make room. Overwriting an
    /// existing key never triggers eviction.
    pub fn insert_with_ttl(
        &self,
        key: u64,
        text: impl Into<String>,
        quality_score: f32,
        ttl: Duration,
    ) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.config.max_entries {
            self.evict_lowest_value();
        }
        self.entries.insert(
            key,
            CacheEntry {
                text: text.into(),
                created_at: Instant::now(),
                ttl,
                hit_count: 0,
                quality_score,
            },
        );
    }

    /// Evict the single entry with the lowest `(hit_count, quality_score)`.
    fn evict_lowest_value(&self) {
        let victim = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.hit_count, entry.quality_score))
            .min_by(|a, b| a.1.cmp(&b.1).then(a.2.total_cmp(&b.2)));

        if let Some((key, hit_count, quality_score)) = victim {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => "capacity")
                .increment(1);
            debug!(key, hit_count, quality_score, "evicted lowest-value cache entry");
        }
    }

    /// Drop all expired entries.
    ///
    /// Runs concurrently with reads and writes; `DashMap::retain` locks
    /// one shard at a time.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.expired(now));
        let swept = before.saturating_sub(self.entries.len());
        if swept > 0 {
            self.evictions.fetch_add(swept as u64, Ordering::Relaxed);
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => "expired")
                .increment(swept as u64);
            debug!(swept, "swept expired cache entries");
        }
    }

    /// Read-only statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        CacheStats {
            hits,
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
            cost_saved_usd: hits as f64 * self.config.per_call_cost_usd,
        }
    }

    /// Evict all entries. Statistics are preserved.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Compute a cache key from request text, content mode, and caller tier.
///
/// The text is normalized (trimmed, lowercased, inner whitespace
/// collapsed) so trivially different phrasings of the same request share
/// an entry. Uses `DefaultHasher` (SipHash); the hash only needs to be
/// stable within a process lifetime.
pub fn cache_key(text: &str, mode: ContentMode, tier: CallerTier) -> u64 {
    let mut hasher = DefaultHasher::new();
    for word in text.split_whitespace() {
        word.to_lowercase().hash(&mut hasher);
    }
    mode.as_str().hash(&mut hasher);
    tier.as_str().hash(&mut hasher);
    hasher.finish()
}
