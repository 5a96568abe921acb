//! Central Prometheus metrics registry.
//!
//! Metrics are registered lazily on first access using `once_cell::Lazy`,
//! mirroring the teacher's metrics module.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

/// Total result-cache hits.
pub static CACHE_HITS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("mosaicdb_cache_hits_total", "Total result cache hits")
        .expect("failed to register cache hit counter")
});

/// Total result-cache misses.
pub static CACHE_MISSES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("mosaicdb_cache_misses_total", "Total result cache misses")
        .expect("failed to register cache miss counter")
});

/// Currently registered shard count.
pub static SHARD_COUNT: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("mosaicdb_shard_count", "Number of shards registered in the routing index")
        .expect("failed to register shard count gauge")
});

/// Shards currently attached to the analytics bridge.
pub static ATTACHED_SHARD_COUNT: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "mosaicdb_attached_shard_count",
        "Number of shards currently attached to the analytical engine"
    )
    .expect("failed to register attached shard count gauge")
});

/// Per-shard failures recovered at the fan-out boundary.
pub static SHARD_UNAVAILABLE: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "mosaicdb_shard_unavailable_total",
        "Total per-shard failures recovered during fan-out"
    )
    .expect("failed to register shard unavailable counter")
});

/// Bloom-filter prunes, by shard.
pub static BLOOM_PRUNED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "mosaicdb_bloom_pruned_total",
        "Total shards pruned from routing by the bloom filter"
    )
    .expect("failed to register bloom pruned counter")
});

/// Classifier decisions by resulting class.
pub static CLASSIFIER_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "mosaicdb_classifier_decisions_total",
        "Total classifier decisions by class",
        &["class"]
    )
    .expect("failed to register classifier decision counter")
});

/// Fan-out latency, end-to-end across all shards for one query.
pub static FAN_OUT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "mosaicdb_fan_out_duration_seconds",
        "Fan-out executor duration in seconds",
        &["outcome"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("failed to register fan-out duration histogram")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_without_panicking() {
        CACHE_HITS.inc();
        CACHE_MISSES.inc();
        SHARD_COUNT.set(3);
        ATTACHED_SHARD_COUNT.set(2);
        SHARD_UNAVAILABLE.inc();
        BLOOM_PRUNED.inc();
        CLASSIFIER_DECISIONS.with_label_values(&["vector_search"]).inc();
        FAN_OUT_DURATION.with_label_values(&["success"]).observe(0.01);
        assert!(CACHE_HITS.get() >= 1);
    }
}
