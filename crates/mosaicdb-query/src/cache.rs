//! Result cache (C13): a moka-backed TTL cache keyed by a SHA-256
//! fingerprint of `(query_text, normalized options, ranker identity)`.
//!
//! Bounded memory and a TTL, not an exact eviction order, so `moka`'s
//! approximate W-TinyLFU admission policy is the right fit here — unlike
//! the hot-shard cache (C4), which needs an exact LRU guarantee.

use std::time::Duration;

use moka::future::Cache as MokaCache;
use sha2::{Digest, Sha256};

/// Default time-to-live for a cached result, per the spec.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
/// Default maximum number of cached entries.
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// The inputs a cache key is fingerprinted from.
#[derive(Debug, Clone)]
pub struct CacheKeyInput<'a> {
    pub query_text: &'a str,
    /// Query options normalized to a stable canonical form (e.g. sorted
    /// `key=value` pairs) by the caller.
    pub options_canonical: &'a str,
    /// Identity hash of the ranker configuration in effect (scorer set,
    /// weights, fusion strategy) — results are only interchangeable under
    /// the same ranker identity.
    pub ranker_identity: &'a str,
}

/// Computes the cache fingerprint for `input`.
#[must_use]
pub fn fingerprint(input: &CacheKeyInput) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.query_text.as_bytes());
    hasher.update([0u8]);
    hasher.update(input.options_canonical.as_bytes());
    hasher.update([0u8]);
    hasher.update(input.ranker_identity.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Bounded TTL cache of serialized result lists, keyed by fingerprint.
pub struct ResultCache {
    inner: MokaCache<String, Vec<u8>>,
}

impl ResultCache {
    /// Creates a cache with `max_entries` capacity and `ttl` expiry.
    #[must_use]
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        Self {
            inner: MokaCache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Creates a cache with the spec's default capacity and TTL.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_TTL)
    }

    /// Fetches a cached, serialized result list.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key).await
    }

    /// Inserts a serialized result list.
    pub async fn set(&self, key: String, value: Vec<u8>) {
        self.inner.insert(key, value).await;
    }

    /// Coarsely clears every entry. Invoked on shard registration, per the
    /// spec's "cache is cleared (coarse invalidation)" rule — finer-grained
    /// invalidation is explicitly not required.
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Current (approximate) entry count, for metrics.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}
