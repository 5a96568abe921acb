//! Fusion strategies (C8): combine per-scorer signals into a single
//! `final_score`, then sort and threshold the result.

use std::collections::HashMap;

use mosaicdb_core::{Candidate, ScoredCandidate};

use crate::scorer::{RankingContext, Scorer};

/// Selects how per-scorer `[0, 1]` scores combine into `final_score`.
#[derive(Debug, Clone)]
pub enum FusionStrategy {
    /// `final = Σ weight_s · score_s(doc)`.
    WeightedSum,
    /// Reciprocal rank fusion: `final = Σ 1 / (k + rank_s)`, ranks assigned
    /// by sorting each scorer's raw scores descending.
    ReciprocalRank {
        /// Smoothing constant, default 60.
        k: u32,
    },
    /// `final = max_s score_s(doc)` (unweighted).
    MaxScore,
}

impl Default for FusionStrategy {
    fn default() -> Self {
        Self::WeightedSum
    }
}

/// Ranker (C8): scores every candidate with `scorers`, fuses per
/// `strategy`, sorts, and filters by `min_score`.
pub struct Ranker {
    scorers: Vec<Box<dyn Scorer>>,
    strategy: FusionStrategy,
    min_score: f32,
}

impl Ranker {
    #[must_use]
    pub fn new(scorers: Vec<Box<dyn Scorer>>, strategy: FusionStrategy, min_score: f32) -> Self {
        Self {
            scorers,
            strategy,
            min_score,
        }
    }

    /// Scores, fuses, sorts, and filters `candidates`.
    #[must_use]
    pub fn rank(&self, candidates: Vec<Candidate>, ctx: &RankingContext) -> Vec<ScoredCandidate> {
        let raw: Vec<(Candidate, HashMap<String, f32>)> = candidates
            .into_iter()
            .map(|c| {
                let scores = self
                    .scorers
                    .iter()
                    .map(|s| (s.name().to_string(), s.score(&c, ctx)))
                    .collect();
                (c, scores)
            })
            .collect();

        let final_scores = self.fuse(&raw);

        let mut scored: Vec<ScoredCandidate> = raw
            .into_iter()
            .zip(final_scores)
            .map(|((candidate, scores), final_score)| ScoredCandidate {
                candidate,
                scores,
                final_score,
                grounding: None,
            })
            .collect();

        scored.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.candidate.similarity.partial_cmp(&a.candidate.similarity).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.candidate.id.cmp(&b.candidate.id))
        });

        scored.retain(|s| s.final_score >= self.min_score);
        scored
    }

    fn fuse(&self, raw: &[(Candidate, HashMap<String, f32>)]) -> Vec<f32> {
        match &self.strategy {
            FusionStrategy::WeightedSum => raw
                .iter()
                .map(|(_, scores)| {
                    self.scorers
                        .iter()
                        .map(|s| s.weight() * scores.get(s.name()).copied().unwrap_or(0.0))
                        .sum()
                })
                .collect(),
            FusionStrategy::MaxScore => raw
                .iter()
                .map(|(_, scores)| scores.values().copied().fold(0.0_f32, f32::max))
                .collect(),
            FusionStrategy::ReciprocalRank { k } => self.reciprocal_rank_fuse(raw, *k),
        }
    }

    fn reciprocal_rank_fuse(&self, raw: &[(Candidate, HashMap<String, f32>)], k: u32) -> Vec<f32> {
        let mut totals = vec![0.0_f32; raw.len()];

        for scorer in &self.scorers {
            let mut order: Vec<usize> = (0..raw.len()).collect();
            order.sort_by(|&a, &b| {
                let sa = raw[a].1.get(scorer.name()).copied().unwrap_or(0.0);
                let sb = raw[b].1.get(scorer.name()).copied().unwrap_or(0.0);
                sb.partial_cmp(&sa)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| raw[a].0.id.cmp(&raw[b].0.id))
            });
            for (rank, &idx) in order.iter().enumerate() {
                totals[idx] += 1.0 / (k as f32 + (rank + 1) as f32);
            }
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::VectorSimilarityScorer;
    use chrono::Utc;
    use mosaicdb_core::ShardId;

    fn candidate(id: &str, similarity: f32) -> Candidate {
        Candidate {
            id: id.to_string(),
            doc_id: "d1".to_string(),
            shard_id: ShardId::from("s1"),
            text: String::new(),
            metadata: serde_json::Map::new(),
            pagerank: 0.0,
            similarity,
        }
    }

    fn ctx() -> RankingContext {
        RankingContext::new(vec![], Utc::now())
    }

    #[test]
    fn weighted_sum_orders_by_final_score() {
        let ranker = Ranker::new(vec![Box::new(VectorSimilarityScorer::new(1.0))], FusionStrategy::WeightedSum, 0.0);
        let results = ranker.rank(vec![candidate("a", 0.2), candidate("b", 0.8)], &ctx());
        assert_eq!(results[0].candidate.id, "b");
    }

    #[test]
    fn min_score_filters_low_scoring_candidates() {
        let ranker = Ranker::new(vec![Box::new(VectorSimilarityScorer::new(1.0))], FusionStrategy::WeightedSum, 0.5);
        let results = ranker.rank(vec![candidate("a", 0.2), candidate("b", 0.8)], &ctx());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].candidate.id, "b");
    }

    #[test]
    fn tie_break_prefers_similarity_then_id() {
        let ranker = Ranker::new(vec![], FusionStrategy::WeightedSum, 0.0);
        let mut a = candidate("b", 0.5);
        a.similarity = 0.5;
        let mut b = candidate("a", 0.5);
        b.similarity = 0.5;
        let results = ranker.rank(vec![a, b], &ctx());
        // both tie on final_score (no scorers => 0) and similarity; id breaks the tie
        assert_eq!(results[0].candidate.id, "a");
    }

    #[test]
    fn max_score_takes_highest_signal() {
        let ranker = Ranker::new(vec![Box::new(VectorSimilarityScorer::new(1.0))], FusionStrategy::MaxScore, 0.0);
        let results = ranker.rank(vec![candidate("a", 0.9)], &ctx());
        assert!((results[0].final_score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn reciprocal_rank_rewards_consistent_top_ranks() {
        let ranker = Ranker::new(
            vec![Box::new(VectorSimilarityScorer::new(1.0))],
            FusionStrategy::ReciprocalRank { k: 60 },
            0.0,
        );
        let results = ranker.rank(vec![candidate("a", 0.9), candidate("b", 0.1)], &ctx());
        assert_eq!(results[0].candidate.id, "a");
        assert!(results[0].final_score > results[1].final_score);
    }
}
