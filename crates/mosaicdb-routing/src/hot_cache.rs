//! Hot-shard LRU cache (C4): a bounded in-memory map from shard id to
//! [`RoutingEntry`], paired with a monotonic-counter eviction order so the
//! least-recently-promoted entry is always the one evicted under pressure.
//!
//! Deliberately hand-rolled rather than built on `moka`: the spec requires
//! an *exact* LRU eviction-order guarantee (the entry evicted is always the
//! one whose most-recent promotion is earliest among all entries present),
//! which a W-TinyLFU admission cache does not contractually provide.

use std::collections::{BTreeMap, HashMap};

use mosaicdb_core::{Level, RoutingEntry, ShardId};
use parking_lot::Mutex;

struct Inner {
    entries: HashMap<ShardId, RoutingEntry>,
    /// seq -> shard id, ordered ascending by recency of promotion (oldest first).
    order: BTreeMap<u64, ShardId>,
    /// shard id -> its current seq in `order`, so a promotion can find and
    /// remove the stale entry in O(log C).
    seq_of: HashMap<ShardId, u64>,
    next_seq: u64,
    capacity: usize,
}

/// Bounded LRU cache over [`RoutingEntry`] values, capacity `C` (default
/// 10,000). All state transitions (insert/evict/promote) are linearizable
/// under a single coarse lock, per the spec's resource model: `O(log C)`
/// work per transition is acceptable.
pub struct HotShardCache {
    inner: Mutex<Inner>,
}

impl HotShardCache {
    /// Creates an empty cache with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                seq_of: HashMap::new(),
                next_seq: 0,
                capacity: capacity.max(1),
            }),
        }
    }

    /// Preloads the cache with `entries`, most-recently-used last (i.e. the
    /// caller should pass entries already ordered, highest-priority last,
    /// e.g. ascending `query_count` so the top shard ends up MRU). If
    /// `entries` exceeds capacity, only the tail (last `capacity` entries)
    /// is retained.
    pub fn preload(&self, entries: Vec<RoutingEntry>) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
        inner.seq_of.clear();
        inner.next_seq = 0;

        let capacity = inner.capacity;
        let start = entries.len().saturating_sub(capacity);
        for entry in entries.into_iter().skip(start) {
            let id = entry.shard.id.clone();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.order.insert(seq, id.clone());
            inner.seq_of.insert(id.clone(), seq);
            inner.entries.insert(id, entry);
        }
    }

    /// Fetches an entry, promoting it to most-recently-used on hit.
    #[must_use]
    pub fn get(&self, id: &ShardId) -> Option<RoutingEntry> {
        let mut inner = self.inner.lock();
        if !inner.entries.contains_key(id) {
            return None;
        }
        Self::promote(&mut inner, id);
        inner.entries.get(id).cloned()
    }

    /// Admits `entry`, evicting the least-recently-used entry if the cache
    /// is at capacity. Admission counts as a promotion.
    pub fn insert(&self, entry: RoutingEntry) {
        let mut inner = self.inner.lock();
        let id = entry.shard.id.clone();

        if inner.entries.contains_key(&id) {
            inner.entries.insert(id.clone(), entry);
            Self::promote(&mut inner, &id);
            return;
        }

        if inner.entries.len() >= inner.capacity {
            if let Some((&lru_seq, _)) = inner.order.iter().next() {
                if let Some(lru_id) = inner.order.remove(&lru_seq) {
                    inner.entries.remove(&lru_id);
                    inner.seq_of.remove(&lru_id);
                }
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, id.clone());
        inner.seq_of.insert(id.clone(), seq);
        inner.entries.insert(id, entry);
    }

    /// Current number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity `C`.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Snapshots every currently cached entry that has a centroid at
    /// `level`. This is a bulk scan, not a keyed lookup, so unlike
    /// [`HotShardCache::get`] it does not promote the returned entries.
    #[must_use]
    pub fn shards_at_level(&self, level: Level) -> Vec<RoutingEntry> {
        let inner = self.inner.lock();
        inner
            .entries
            .values()
            .filter(|e| e.centroids.contains_key(&level))
            .cloned()
            .collect()
    }

    fn promote(inner: &mut Inner, id: &ShardId) {
        if let Some(old_seq) = inner.seq_of.remove(id) {
            inner.order.remove(&old_seq);
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, id.clone());
        inner.seq_of.insert(id.clone(), seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaicdb_core::{Level, Shard, ShardCentroid, ShardStatus};
    use std::collections::HashMap as StdHashMap;

    fn entry(id: &str) -> RoutingEntry {
        let shard_id = ShardId::from(id);
        let mut centroids = StdHashMap::new();
        centroids.insert(
            Level::Paragraph,
            ShardCentroid {
                shard_id: shard_id.clone(),
                level: Level::Paragraph,
                centroid: vec![1.0],
                centroid_norm: 1.0,
            },
        );
        RoutingEntry {
            shard: Shard {
                id: shard_id,
                path: format!("/{id}"),
                doc_count: 1,
                query_count: 0,
                last_accessed: None,
                status: ShardStatus::Active,
                bloom_filter: None,
            },
            centroids,
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let cache = HotShardCache::new(10);
        cache.insert(entry("a"));
        assert!(cache.get(&ShardId::from("a")).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn miss_on_unknown_id() {
        let cache = HotShardCache::new(10);
        assert!(cache.get(&ShardId::from("missing")).is_none());
    }

    #[test]
    fn eviction_removes_least_recently_promoted() {
        let cache = HotShardCache::new(2);
        cache.insert(entry("a"));
        cache.insert(entry("b"));
        // promote "a" so "b" becomes the LRU entry
        cache.get(&ShardId::from("a"));
        cache.insert(entry("c"));

        assert!(cache.get(&ShardId::from("b")).is_none(), "b should have been evicted");
        assert!(cache.get(&ShardId::from("a")).is_some());
        assert!(cache.get(&ShardId::from("c")).is_some());
    }

    #[test]
    fn capacity_is_enforced_under_repeated_inserts() {
        let cache = HotShardCache::new(3);
        for i in 0..10 {
            cache.insert(entry(&format!("s{i}")));
        }
        assert_eq!(cache.len(), 3);
        // only the last 3 inserted survive since none were re-promoted
        for i in 7..10 {
            assert!(cache.get(&ShardId::from(format!("s{i}"))).is_some());
        }
    }

    #[test]
    fn preload_truncates_to_capacity_keeping_tail() {
        let cache = HotShardCache::new(2);
        cache.preload(vec![entry("a"), entry("b"), entry("c")]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&ShardId::from("a")).is_none());
        assert!(cache.get(&ShardId::from("b")).is_some());
        assert!(cache.get(&ShardId::from("c")).is_some());
    }

    #[test]
    fn reinserting_existing_key_promotes_without_growing() {
        let cache = HotShardCache::new(2);
        cache.insert(entry("a"));
        cache.insert(entry("b"));
        cache.insert(entry("a"));
        cache.insert(entry("c"));
        // "b" was least recently promoted, should be evicted
        assert!(cache.get(&ShardId::from("b")).is_none());
        assert_eq!(cache.len(), 2);
    }
}
