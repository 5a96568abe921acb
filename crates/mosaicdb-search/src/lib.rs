//! Shard router (C6) and ranking-context helpers (C14) for the hot vector
//! search path.

pub mod context;
pub mod router;

pub use context::{decode_metadata, distance_to_similarity, extract_term_set, extract_terms, parse_datetime};
pub use router::{RouteRequest, RoutedShard, ShardRouter};
