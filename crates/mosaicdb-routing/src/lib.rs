//! Persistent shard-routing index (C3) and hot-shard LRU cache (C4).

pub mod codec;
pub mod hot_cache;
pub mod index;

pub use hot_cache::HotShardCache;
pub use index::{RoutingIndex, ShardRegistration};
