//! Set-membership primitive used to prune shards by query term before the
//! more expensive centroid-similarity scoring pass.
//!
//! Guarantees no false negatives: if a term was ever [`BloomFilter::add`]ed,
//! [`BloomFilter::contains`] is guaranteed to return `true` for it.

use serde::{Deserialize, Serialize};

/// Default bit-vector size.
pub const DEFAULT_BITS: usize = 10_000;
/// Default number of hash functions.
pub const DEFAULT_HASHES: usize = 5;

/// A bloom filter over bit-packed `u64` words, using Kirsch-Mitzenmacher
/// double hashing to derive `k` independent-enough indices from two base
/// hashes, avoiding `k` separate hash function implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloomFilter {
    bits: Vec<u64>,
    m: usize,
    k: usize,
}

impl BloomFilter {
    /// Creates an empty filter with `m` bits and `k` hash functions.
    #[must_use]
    pub fn new(m: usize, k: usize) -> Self {
        let words = m.div_ceil(64).max(1);
        Self {
            bits: vec![0u64; words],
            m: m.max(1),
            k: k.max(1),
        }
    }

    /// Creates an empty filter with the default size (`m = 10_000`, `k = 5`).
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_BITS, DEFAULT_HASHES)
    }

    /// Adds a term to the filter.
    pub fn add(&mut self, term: &str) {
        let (h1, h2) = base_hashes(term);
        for i in 0..self.k {
            let idx = self.index_for(h1, h2, i);
            self.set_bit(idx);
        }
    }

    /// Returns `true` if `term` may be a member (false positives possible,
    /// false negatives never).
    #[must_use]
    pub fn contains(&self, term: &str) -> bool {
        let (h1, h2) = base_hashes(term);
        (0..self.k).all(|i| {
            let idx = self.index_for(h1, h2, i);
            self.get_bit(idx)
        })
    }

    /// Returns `true` if any of `terms` may be a member (disjunctive,
    /// matching the "any-match" semantics queries use over multiple terms).
    #[must_use]
    pub fn contains_any<S: AsRef<str>>(&self, terms: &[S]) -> bool {
        terms.iter().any(|t| self.contains(t.as_ref()))
    }

    fn index_for(&self, h1: u64, h2: u64, i: usize) -> usize {
        let combined = h1.wrapping_add((i as u64).wrapping_mul(h2));
        (combined % self.m as u64) as usize
    }

    fn set_bit(&mut self, idx: usize) {
        let word = idx / 64;
        let bit = idx % 64;
        self.bits[word] |= 1u64 << bit;
    }

    fn get_bit(&self, idx: usize) -> bool {
        let word = idx / 64;
        let bit = idx % 64;
        (self.bits[word] >> bit) & 1 == 1
    }

    /// Serializes the filter to an opaque byte string: a 1-byte version tag,
    /// little-endian `m` and `k` as `u32`, then the packed bit words.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(9 + self.bits.len() * 8);
        out.push(1u8); // version
        out.extend_from_slice(&(self.m as u32).to_le_bytes());
        out.extend_from_slice(&(self.k as u32).to_le_bytes());
        for word in &self.bits {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Deserializes a filter previously produced by [`BloomFilter::to_bytes`].
    /// Returns `None` on any malformed input rather than panicking, since
    /// shard metadata is untrusted external state.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 9 || bytes[0] != 1 {
            return None;
        }
        let m = u32::from_le_bytes(bytes[1..5].try_into().ok()?) as usize;
        let k = u32::from_le_bytes(bytes[5..9].try_into().ok()?) as usize;
        let word_bytes = &bytes[9..];
        if word_bytes.len() % 8 != 0 {
            return None;
        }
        let bits = word_bytes
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
            .collect();
        Some(Self {
            bits,
            m: m.max(1),
            k: k.max(1),
        })
    }
}

fn base_hashes(term: &str) -> (u64, u64) {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut h1 = DefaultHasher::new();
    term.hash(&mut h1);
    let first = h1.finish();

    // Second, independent hash: salt the input so h2 != h1 even for the
    // default hasher's fixed keys.
    let mut h2 = DefaultHasher::new();
    0xA5A5_A5A5_u64.hash(&mut h2);
    term.hash(&mut h2);
    let second = h2.finish();

    (first, second | 1) // force odd so repeated addition cycles through all slots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_after_add() {
        let mut f = BloomFilter::with_defaults();
        f.add("mosaic");
        assert!(f.contains("mosaic"));
    }

    #[test]
    fn never_false_negative_across_many_terms() {
        let mut f = BloomFilter::with_defaults();
        let terms: Vec<String> = (0..500).map(|i| format!("term-{i}")).collect();
        for t in &terms {
            f.add(t);
        }
        for t in &terms {
            assert!(f.contains(t), "false negative for {t}");
        }
    }

    #[test]
    fn absent_term_usually_not_contained() {
        let mut f = BloomFilter::with_defaults();
        f.add("mosaic");
        assert!(!f.contains("completely-unrelated-term-xyz"));
    }

    #[test]
    fn round_trip_serialization() {
        let mut f = BloomFilter::with_defaults();
        f.add("alpha");
        f.add("beta");
        let bytes = f.to_bytes();
        let restored = BloomFilter::from_bytes(&bytes).unwrap();
        assert!(restored.contains("alpha"));
        assert!(restored.contains("beta"));
    }

    #[test]
    fn from_bytes_rejects_malformed_input() {
        assert!(BloomFilter::from_bytes(&[0, 1, 2]).is_none());
    }

    #[test]
    fn contains_any_is_disjunctive() {
        let mut f = BloomFilter::with_defaults();
        f.add("mosaic");
        let terms = vec!["databases", "mosaic"];
        assert!(f.contains_any(&terms));
        let absent = vec!["databases", "unrelated"];
        assert!(!f.contains_any(&absent));
    }
}
