//! Scorers (C8): each implements `name`, `weight`, and a `score` producing
//! a value in `[0, 1]`, normalized the way spec'd for its signal.

use chrono::{DateTime, Utc};
use mosaicdb_core::Candidate;
use mosaicdb_search::{extract_term_set, parse_datetime};

/// Shared context every scorer consumes in addition to the candidate
/// itself: the query's extracted terms and the instant ranking runs at.
#[derive(Debug, Clone)]
pub struct RankingContext {
    pub query_terms: Vec<String>,
    pub now: DateTime<Utc>,
    /// Normalization constant for the `pagerank` scorer (default 100).
    pub pagerank_max: f32,
    /// Half-life in days for the `freshness` scorer (default 30).
    pub freshness_half_life_days: f32,
}

impl RankingContext {
    /// Builds a context at the current instant with default normalization
    /// constants.
    #[must_use]
    pub fn new(query_terms: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            query_terms,
            now,
            pagerank_max: 100.0,
            freshness_half_life_days: 30.0,
        }
    }
}

/// A pluggable ranking signal: `name()`/`weight()` feed fusion, `score()`
/// maps a candidate to `[0, 1]`.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;
    fn weight(&self) -> f32;
    fn score(&self, candidate: &Candidate, ctx: &RankingContext) -> f32;
}

/// Identity on the already-cosine-normalized similarity; negative values
/// (possible when the upstream similarity metric isn't bounded at 0)
/// clamp to 0.
pub struct VectorSimilarityScorer {
    weight: f32,
}

impl VectorSimilarityScorer {
    #[must_use]
    pub fn new(weight: f32) -> Self {
        Self { weight }
    }
}

impl Scorer for VectorSimilarityScorer {
    fn name(&self) -> &str {
        "vector_similarity"
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn score(&self, candidate: &Candidate, _ctx: &RankingContext) -> f32 {
        candidate.similarity.clamp(0.0, 1.0)
    }
}

/// `min(1.0, pagerank / PR_MAX)`.
pub struct PageRankScorer {
    weight: f32,
}

impl PageRankScorer {
    #[must_use]
    pub fn new(weight: f32) -> Self {
        Self { weight }
    }
}

impl Scorer for PageRankScorer {
    fn name(&self) -> &str {
        "pagerank"
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn score(&self, candidate: &Candidate, ctx: &RankingContext) -> f32 {
        (candidate.pagerank / ctx.pagerank_max.max(f32::EPSILON)).min(1.0)
    }
}

/// `0.5^(age_days / H)`. A candidate with no parseable publication date in
/// its metadata (key `published_at`) scores neutrally at 0.5.
pub struct FreshnessScorer {
    weight: f32,
}

impl FreshnessScorer {
    #[must_use]
    pub fn new(weight: f32) -> Self {
        Self { weight }
    }
}

impl Scorer for FreshnessScorer {
    fn name(&self) -> &str {
        "freshness"
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn score(&self, candidate: &Candidate, ctx: &RankingContext) -> f32 {
        let published_at = candidate
            .metadata
            .get("published_at")
            .and_then(|v| v.as_str())
            .and_then(parse_datetime);

        let Some(published_at) = published_at else {
            return 0.5;
        };

        let age_days = (ctx.now - published_at).num_seconds() as f32 / 86_400.0;
        0.5_f32.powf(age_days.max(0.0) / ctx.freshness_half_life_days.max(f32::EPSILON))
    }
}

/// Fraction of query terms occurring case-insensitively in `text`. Zero
/// query terms scores 0 (no signal, rather than dividing by zero).
pub struct TextMatchScorer {
    weight: f32,
}

impl TextMatchScorer {
    #[must_use]
    pub fn new(weight: f32) -> Self {
        Self { weight }
    }
}

impl Scorer for TextMatchScorer {
    fn name(&self) -> &str {
        "text_match"
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn score(&self, candidate: &Candidate, ctx: &RankingContext) -> f32 {
        if ctx.query_terms.is_empty() {
            return 0.0;
        }
        let text_terms = extract_term_set(&candidate.text);
        let hits = ctx
            .query_terms
            .iter()
            .filter(|t| text_terms.contains(t.to_lowercase().as_str()))
            .count();
        hits as f32 / ctx.query_terms.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(similarity: f32, pagerank: f32, text: &str) -> Candidate {
        Candidate {
            id: "c1".to_string(),
            doc_id: "d1".to_string(),
            shard_id: mosaicdb_core::ShardId::from("s1"),
            text: text.to_string(),
            metadata: serde_json::Map::new(),
            pagerank,
            similarity,
        }
    }

    fn ctx(terms: Vec<&str>) -> RankingContext {
        RankingContext::new(terms.into_iter().map(String::from).collect(), Utc::now())
    }

    #[test]
    fn vector_similarity_clamps_negative_to_zero() {
        let scorer = VectorSimilarityScorer::new(1.0);
        let c = candidate(-0.5, 0.0, "x");
        assert_eq!(scorer.score(&c, &ctx(vec![])), 0.0);
    }

    #[test]
    fn pagerank_normalizes_and_caps_at_one() {
        let scorer = PageRankScorer::new(1.0);
        let c = candidate(0.0, 500.0, "x");
        assert_eq!(scorer.score(&c, &ctx(vec![])), 1.0);
    }

    #[test]
    fn freshness_missing_date_is_neutral() {
        let scorer = FreshnessScorer::new(1.0);
        let c = candidate(0.0, 0.0, "x");
        assert_eq!(scorer.score(&c, &ctx(vec![])), 0.5);
    }

    #[test]
    fn freshness_decays_with_age() {
        let scorer = FreshnessScorer::new(1.0);
        let mut c = candidate(0.0, 0.0, "x");
        c.metadata.insert("published_at".to_string(), json!("2020-01-01T00:00:00Z"));
        let old_score = scorer.score(&c, &ctx(vec![]));
        assert!(old_score < 0.5);
    }

    #[test]
    fn text_match_counts_case_insensitive_hits() {
        let scorer = TextMatchScorer::new(1.0);
        let c = candidate(0.0, 0.0, "MosaicDB is a Federated Coordinator");
        let score = scorer.score(&c, &ctx(vec!["mosaic", "missing"]));
        assert!((score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn text_match_with_no_terms_is_zero() {
        let scorer = TextMatchScorer::new(1.0);
        let c = candidate(0.0, 0.0, "anything");
        assert_eq!(scorer.score(&c, &ctx(vec![])), 0.0);
    }
}
