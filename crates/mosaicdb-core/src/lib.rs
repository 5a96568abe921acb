//! Core domain types, error kinds, configuration, metrics, and external
//! collaborator traits for the MosaicDB coordinator.

pub mod bloom;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod traits;
pub mod vector;

pub use bloom::BloomFilter;
pub use config::MosaicConfig;
pub use error::{MosaicError, MosaicResult};
pub use model::{
    Candidate, Chunk, Grounding, Level, RoutingEntry, Shard, ShardCentroid, ShardId, ShardStatus,
    ScoredCandidate,
};
pub use traits::{Embedder, ZeroVectorEmbedder};
