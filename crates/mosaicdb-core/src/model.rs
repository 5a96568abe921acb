//! Core domain types shared across the coordinator's query path.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Stable opaque shard identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShardId(pub String);

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ShardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ShardId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Lifecycle state of a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardStatus {
    Active,
    Archived,
}

/// Chunking granularity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Document,
    Paragraph,
    Sentence,
}

impl Level {
    /// Column/table-name fragment used when building per-level SQL.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Paragraph => "paragraph",
            Self::Sentence => "sentence",
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::Paragraph
    }
}

/// A logical shard as recorded by the routing index. Immutable to the
/// coordinator for the duration of any single query; only `query_count` and
/// `last_accessed` are ever updated by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shard {
    pub id: ShardId,
    pub path: String,
    pub doc_count: u64,
    pub query_count: u64,
    pub last_accessed: Option<DateTime<Utc>>,
    pub status: ShardStatus,
    pub bloom_filter: Option<Vec<u8>>,
}

/// A shard's centroid at a given granularity level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardCentroid {
    pub shard_id: ShardId,
    pub level: Level,
    pub centroid: Vec<f32>,
    pub centroid_norm: f32,
}

/// In-memory projection of `Shard ⋈ ShardCentroid` held by the hot-shard LRU.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingEntry {
    pub shard: Shard,
    pub centroids: HashMap<Level, ShardCentroid>,
}

/// A stored text chunk at some granularity level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub doc_id: String,
    pub parent_id: Option<String>,
    pub level: Level,
    pub text: String,
    pub start_offset: u32,
    pub end_offset: u32,
    pub pagerank: f32,
}

/// A candidate produced by the fan-out executor, prior to ranking/fusion.
///
/// Kept as an explicit struct (rather than a free-form map) per the
/// redesign guidance to replace dynamic tagged records with named stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub doc_id: String,
    pub shard_id: ShardId,
    pub text: String,
    pub metadata: serde_json::Map<String, JsonValue>,
    pub pagerank: f32,
    pub similarity: f32,
}

/// Provenance structure linking a result back to its source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grounding {
    pub document_text: String,
    pub start_offset: u32,
    pub end_offset: u32,
    pub parent_text: Option<String>,
}

/// A [`Candidate`] after scoring and fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub scores: HashMap<String, f32>,
    pub final_score: f32,
    pub grounding: Option<Grounding>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_id_display() {
        let id = ShardId::from("shard-1");
        assert_eq!(format!("{id}"), "shard-1");
    }

    #[test]
    fn level_default_is_paragraph() {
        assert_eq!(Level::default(), Level::Paragraph);
    }
}
