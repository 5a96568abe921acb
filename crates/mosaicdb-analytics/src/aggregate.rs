//! Aggregator (C12): for simple aggregates (COUNT/SUM/MIN/MAX/AVG with at
//! most a single grouping key, no HAVING/JOIN/subquery/window) the router
//! can skip the analytics bridge entirely and merge per-shard results
//! in-process. Anything more complex escalates to [`crate::bridge`].

use std::collections::HashMap;

use mosaicdb_core::{MosaicError, MosaicResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// A simple aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl AggregateFn {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Avg => "AVG",
        }
    }
}

static SIMPLE_AGGREGATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^SELECT\s+(?:(?P<group>[A-Za-z_]\w*)\s*,\s*)?(?P<func>COUNT|SUM|MIN|MAX|AVG)\s*\(\s*(?P<target>\*|[A-Za-z_][\w.]*)\s*\)(?:\s+AS\s+(?P<alias>[A-Za-z_]\w*))?\s+FROM\s+(?P<table>[A-Za-z_]\w*)(?:\s+WHERE\s+(?P<where>.+?))?(?:\s+GROUP\s+BY\s+(?P<groupby>[A-Za-z_]\w*))?(?:\s+ORDER\s+BY\s+[A-Za-z_]\w*\s+(?P<order>ASC|DESC))?(?:\s+LIMIT\s+(?P<limit>\d+))?\s*;?\s*$",
    )
    .unwrap()
});

/// A query matching the "simple aggregate" envelope: a single COUNT/SUM/
/// MIN/MAX/AVG, at most one grouping key, no HAVING/JOIN/subquery/window.
#[derive(Debug, Clone)]
pub struct ParsedAggregate {
    pub func: AggregateFn,
    pub target: String,
    pub table: String,
    pub where_clause: Option<String>,
    pub group_by: Option<String>,
    pub order: Option<SortDirection>,
    pub limit: Option<usize>,
    pub output_alias: String,
}

/// Parses `sql` against the simple-aggregate envelope, returning `None` for
/// anything outside it (the caller escalates to the full analytics bridge).
#[must_use]
pub fn parse_simple_aggregate(sql: &str) -> Option<ParsedAggregate> {
    if reject_if_complex(sql).is_err() {
        return None;
    }
    let caps = SIMPLE_AGGREGATE.captures(sql.trim())?;

    let func = match caps.name("func")?.as_str().to_uppercase().as_str() {
        "COUNT" => AggregateFn::Count,
        "SUM" => AggregateFn::Sum,
        "MIN" => AggregateFn::Min,
        "MAX" => AggregateFn::Max,
        "AVG" => AggregateFn::Avg,
        _ => return None,
    };

    let group_by = caps.name("groupby").map(|m| m.as_str().to_string());
    if let Some(selected) = caps.name("group") {
        // the leading `<col>, FUNC(...)` projection must name the same
        // column as the trailing `GROUP BY`, or this isn't a key we merge.
        if group_by.as_deref() != Some(selected.as_str()) {
            return None;
        }
    } else if group_by.is_some() {
        return None;
    }

    let order = caps.name("order").map(|m| {
        if m.as_str().eq_ignore_ascii_case("DESC") {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    });
    let limit = caps.name("limit").and_then(|m| m.as_str().parse().ok());
    let output_alias = caps
        .name("alias")
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| func.as_str().to_lowercase());

    Some(ParsedAggregate {
        func,
        target: caps.name("target")?.as_str().to_string(),
        table: caps.name("table")?.as_str().to_string(),
        where_clause: caps.name("where").map(|m| m.as_str().to_string()),
        group_by,
        order,
        limit,
        output_alias,
    })
}

/// One per-shard partial result for a single-aggregate, no-GROUP-BY query:
/// `value` is the aggregate's own output, `count` is the row count the
/// shard contributed (needed to weight an `AVG` merge).
#[derive(Debug, Clone)]
pub struct ShardAggregate {
    pub value: Option<f64>,
    pub count: u64,
}

/// Merges per-shard [`ShardAggregate`]s for a query with no GROUP BY.
///
/// `AVG` is merged as an equal-weight mean of per-shard means, not a
/// row-weighted mean — an explicitly documented approximation, not a
/// row-exact average, since shard row counts are not assumed comparable.
pub fn merge_simple(func: AggregateFn, shard_results: &[ShardAggregate]) -> MosaicResult<Option<f64>> {
    let present: Vec<f64> = shard_results.iter().filter_map(|s| s.value).collect();
    if present.is_empty() {
        return Ok(match func {
            AggregateFn::Count | AggregateFn::Sum => Some(0.0),
            _ => None,
        });
    }

    let merged = match func {
        AggregateFn::Count | AggregateFn::Sum => present.iter().sum(),
        AggregateFn::Min => present.iter().cloned().fold(f64::INFINITY, f64::min),
        AggregateFn::Max => present.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        AggregateFn::Avg => present.iter().sum::<f64>() / present.len() as f64,
    };
    Ok(Some(merged))
}

/// A single group's per-shard partial contribution in a grouped merge.
#[derive(Debug, Clone)]
pub struct GroupedShardRow {
    pub key: Value,
    pub value: Option<f64>,
}

/// Direction for the optional post-merge `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Hash-merges single-key `GROUP BY` partials across shards, applies
/// `func` per group, then optionally sorts and limits the result.
///
/// Grouping keys are compared via their `serde_json::Value` string
/// representation; callers are responsible for producing a stable
/// canonical JSON representation per distinct key.
pub fn merge_grouped(
    func: AggregateFn,
    rows: &[GroupedShardRow],
    order: Option<SortDirection>,
    limit: Option<usize>,
) -> MosaicResult<Vec<(Value, Option<f64>)>> {
    let mut groups: HashMap<String, (Value, Vec<f64>)> = HashMap::new();
    for row in rows {
        let key_repr = row.key.to_string();
        let entry = groups.entry(key_repr).or_insert_with(|| (row.key.clone(), Vec::new()));
        if let Some(v) = row.value {
            entry.1.push(v);
        }
    }

    let mut merged: Vec<(Value, Option<f64>)> = groups
        .into_values()
        .map(|(key, values)| {
            let value = if values.is_empty() {
                match func {
                    AggregateFn::Count | AggregateFn::Sum => Some(0.0),
                    _ => None,
                }
            } else {
                match func {
                    AggregateFn::Count | AggregateFn::Sum => Some(values.iter().sum()),
                    AggregateFn::Min => Some(values.iter().cloned().fold(f64::INFINITY, f64::min)),
                    AggregateFn::Max => Some(values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)),
                    AggregateFn::Avg => Some(values.iter().sum::<f64>() / values.len() as f64),
                }
            };
            (key, value)
        })
        .collect();

    if let Some(direction) = order {
        merged.sort_by(|a, b| {
            let ord = a
                .1
                .partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal);
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });
    }

    if let Some(n) = limit {
        merged.truncate(n);
    }

    Ok(merged)
}

/// Rejects queries that exceed the "simple" aggregate envelope, forcing
/// escalation to the analytics bridge.
pub fn reject_if_complex(sql: &str) -> MosaicResult<()> {
    let upper = sql.to_uppercase();
    let complexity_markers = ["HAVING", "JOIN", "WINDOW", "OVER(", "OVER (", "UNION", "INTERSECT", "EXCEPT"];
    if complexity_markers.iter().any(|m| upper.contains(m)) {
        return Err(MosaicError::invalid_input(
            "query exceeds the simple-aggregate envelope and must use the analytics bridge",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_merges_across_shards() {
        let shards = vec![
            ShardAggregate { value: Some(10.0), count: 3 },
            ShardAggregate { value: Some(5.0), count: 2 },
        ];
        assert_eq!(merge_simple(AggregateFn::Sum, &shards).unwrap(), Some(15.0));
    }

    #[test]
    fn count_with_no_shards_is_zero() {
        assert_eq!(merge_simple(AggregateFn::Count, &[]).unwrap(), Some(0.0));
    }

    #[test]
    fn min_max_ignore_absent_shards() {
        let shards = vec![
            ShardAggregate { value: Some(4.0), count: 1 },
            ShardAggregate { value: None, count: 0 },
            ShardAggregate { value: Some(9.0), count: 1 },
        ];
        assert_eq!(merge_simple(AggregateFn::Min, &shards).unwrap(), Some(4.0));
        assert_eq!(merge_simple(AggregateFn::Max, &shards).unwrap(), Some(9.0));
    }

    #[test]
    fn avg_is_equal_weight_mean_of_shard_means() {
        let shards = vec![
            ShardAggregate { value: Some(10.0), count: 100 },
            ShardAggregate { value: Some(20.0), count: 1 },
        ];
        assert_eq!(merge_simple(AggregateFn::Avg, &shards).unwrap(), Some(15.0));
    }

    #[test]
    fn grouped_merge_sums_per_key() {
        let rows = vec![
            GroupedShardRow { key: Value::from("a"), value: Some(1.0) },
            GroupedShardRow { key: Value::from("a"), value: Some(2.0) },
            GroupedShardRow { key: Value::from("b"), value: Some(5.0) },
        ];
        let merged = merge_grouped(AggregateFn::Sum, &rows, None, None).unwrap();
        let a = merged.iter().find(|(k, _)| k == &Value::from("a")).unwrap();
        assert_eq!(a.1, Some(3.0));
    }

    #[test]
    fn grouped_merge_orders_and_limits() {
        let rows = vec![
            GroupedShardRow { key: Value::from("a"), value: Some(1.0) },
            GroupedShardRow { key: Value::from("b"), value: Some(9.0) },
            GroupedShardRow { key: Value::from("c"), value: Some(5.0) },
        ];
        let merged = merge_grouped(AggregateFn::Sum, &rows, Some(SortDirection::Descending), Some(2)).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].0, Value::from("b"));
        assert_eq!(merged[1].0, Value::from("c"));
    }

    #[test]
    fn complex_query_is_rejected() {
        assert!(reject_if_complex("SELECT a.id FROM a JOIN b ON a.id = b.id").is_err());
        assert!(reject_if_complex("SELECT COUNT(*) FROM docs").is_ok());
    }

    #[test]
    fn parses_bare_count_star() {
        let parsed = parse_simple_aggregate("SELECT COUNT(*) FROM documents").unwrap();
        assert_eq!(parsed.func, AggregateFn::Count);
        assert_eq!(parsed.target, "*");
        assert_eq!(parsed.table, "documents");
        assert_eq!(parsed.output_alias, "count");
        assert!(parsed.group_by.is_none());
    }

    #[test]
    fn parses_aliased_sum_with_where() {
        let parsed = parse_simple_aggregate("SELECT SUM(pagerank) AS total FROM chunks WHERE level = 'paragraph'").unwrap();
        assert_eq!(parsed.func, AggregateFn::Sum);
        assert_eq!(parsed.target, "pagerank");
        assert_eq!(parsed.output_alias, "total");
        assert_eq!(parsed.where_clause.as_deref(), Some("level = 'paragraph'"));
    }

    #[test]
    fn parses_grouped_aggregate_with_order_and_limit() {
        let parsed =
            parse_simple_aggregate("SELECT category, COUNT(*) FROM docs GROUP BY category ORDER BY category DESC LIMIT 5")
                .unwrap();
        assert_eq!(parsed.group_by.as_deref(), Some("category"));
        assert_eq!(parsed.order, Some(SortDirection::Descending));
        assert_eq!(parsed.limit, Some(5));
    }

    #[test]
    fn mismatched_group_column_is_rejected() {
        assert!(parse_simple_aggregate("SELECT category, COUNT(*) FROM docs GROUP BY region").is_none());
    }

    #[test]
    fn complex_query_does_not_parse_as_simple_aggregate() {
        assert!(parse_simple_aggregate("SELECT a.id, COUNT(*) FROM a JOIN b ON a.id = b.id GROUP BY a.id").is_none());
    }

    #[test]
    fn non_aggregate_query_does_not_parse() {
        assert!(parse_simple_aggregate("SELECT id, title FROM docs").is_none());
    }
}
