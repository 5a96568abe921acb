//! Federated analytics bridge (C11) and in-process aggregate merge (C12).

pub mod aggregate;
pub mod bridge;

pub use aggregate::{
    merge_grouped, merge_simple, parse_simple_aggregate, reject_if_complex, AggregateFn, GroupedShardRow, ParsedAggregate,
    ShardAggregate, SortDirection,
};
pub use bridge::{AnalyticalEngine, AnalyticsBridge, SqliteAnalyticalEngine};
