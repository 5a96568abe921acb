//! Ranker (C8): pluggable scorers plus a fusion strategy producing the
//! final candidate ordering.

pub mod fusion;
pub mod scorer;

pub use fusion::{FusionStrategy, Ranker};
pub use scorer::{FreshnessScorer, PageRankScorer, RankingContext, Scorer, TextMatchScorer, VectorSimilarityScorer};
