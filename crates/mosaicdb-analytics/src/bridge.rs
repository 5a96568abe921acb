//! Analytics bridge (C11): rewrites a single logical query over a virtual
//! table name into a federated `UNION ALL` form and executes it once
//! against an in-memory analytical engine.
//!
//! The engine is modeled as a trait so a real `duckdb`-backed
//! implementation could stand in later; the shipped implementation attaches
//! each active shard file read-only into an in-memory `rusqlite` connection,
//! which is the literal mechanism described for this bridge.

use std::collections::HashSet;
use std::sync::Mutex;

use mosaicdb_core::{MosaicError, MosaicResult, ShardId};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use serde_json::{Map, Value};

use crate::aggregate::{merge_grouped, merge_simple, parse_simple_aggregate, GroupedShardRow, ParsedAggregate, ShardAggregate};

static TABLE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bFROM\s+(\w+)\b").unwrap());
static OUTER_ORDER_LIMIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\s+(ORDER\s+BY\s+.+?)?(\s+LIMIT\s+\d+)?\s*;?\s*$").unwrap());

/// Attaches shard databases and executes federated SQL against them.
pub trait AnalyticalEngine: Send + Sync {
    /// Attaches `path` under schema alias `alias`, read-only.
    fn attach(&self, alias: &str, path: &str) -> MosaicResult<()>;
    /// Detaches schema alias `alias`.
    fn detach(&self, alias: &str) -> MosaicResult<()>;
    /// Executes `sql`, returning rows as column-keyed JSON objects.
    fn execute(&self, sql: &str) -> MosaicResult<Vec<Value>>;
}

/// `rusqlite`-backed [`AnalyticalEngine`]: an in-memory connection with each
/// active shard file `ATTACH DATABASE ... AS <alias>`-ed read-only.
pub struct SqliteAnalyticalEngine {
    conn: Mutex<Connection>,
}

impl SqliteAnalyticalEngine {
    /// Opens a fresh in-memory analytical connection.
    pub fn new() -> MosaicResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MosaicError::internal(format!("failed to open analytics engine: {e}")))?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

impl Default for SqliteAnalyticalEngine {
    fn default() -> Self {
        Self::new().expect("in-memory sqlite connection should always open")
    }
}

impl AnalyticalEngine for SqliteAnalyticalEngine {
    fn attach(&self, alias: &str, path: &str) -> MosaicResult<()> {
        let conn = self.conn.lock().expect("analytics engine mutex poisoned");
        let sql = format!("ATTACH DATABASE 'file:{path}?mode=ro&immutable=1' AS {alias}");
        conn.execute_batch(&sql)?;
        Ok(())
    }

    fn detach(&self, alias: &str) -> MosaicResult<()> {
        let conn = self.conn.lock().expect("analytics engine mutex poisoned");
        conn.execute_batch(&format!("DETACH DATABASE {alias}"))?;
        Ok(())
    }

    fn execute(&self, sql: &str) -> MosaicResult<Vec<Value>> {
        let conn = self.conn.lock().expect("analytics engine mutex poisoned");
        let mut stmt = conn.prepare(sql)?;
        let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let rows = stmt.query_map([], move |row| {
            let mut obj = Map::new();
            for (i, name) in column_names.iter().enumerate() {
                let value: Value = match row.get_ref(i)? {
                    rusqlite::types::ValueRef::Null => Value::Null,
                    rusqlite::types::ValueRef::Integer(n) => Value::from(n),
                    rusqlite::types::ValueRef::Real(f) => {
                        serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
                    }
                    rusqlite::types::ValueRef::Text(t) => {
                        Value::String(String::from_utf8_lossy(t).into_owned())
                    }
                    rusqlite::types::ValueRef::Blob(_) => Value::Null,
                };
                obj.insert(name.clone(), value);
            }
            Ok(Value::Object(obj))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn alias_for(shard_id: &ShardId) -> String {
    let sanitized: String = shard_id
        .0
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("shard_{sanitized}")
}

/// Keeps an [`AnalyticalEngine`] in sync with the active shard set, diffing
/// and attaching/detaching incrementally rather than on every query.
pub struct AnalyticsBridge<E: AnalyticalEngine> {
    engine: E,
    attached: Mutex<HashSet<ShardId>>,
}

impl<E: AnalyticalEngine> AnalyticsBridge<E> {
    #[must_use]
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            attached: Mutex::new(HashSet::new()),
        }
    }

    /// Diffs `active_shards` against the currently attached set and attaches
    /// only the difference, per the spec's incremental-attachment rule.
    pub fn sync_shards(&self, active_shards: &[(ShardId, String)]) -> MosaicResult<()> {
        let mut attached = self.attached.lock().expect("bridge mutex poisoned");
        let wanted: HashSet<ShardId> = active_shards.iter().map(|(id, _)| id.clone()).collect();

        let to_detach: Vec<ShardId> = attached.difference(&wanted).cloned().collect();
        for shard_id in &to_detach {
            self.engine.detach(&alias_for(shard_id))?;
            attached.remove(shard_id);
        }

        for (shard_id, path) in active_shards {
            if !attached.contains(shard_id) {
                self.engine.attach(&alias_for(shard_id), path)?;
                attached.insert(shard_id.clone());
            }
        }
        Ok(())
    }

    /// Detaches every currently attached shard and re-attaches from
    /// `active_shards`, per the spec's `refresh` operation.
    pub fn refresh(&self, active_shards: &[(ShardId, String)]) -> MosaicResult<()> {
        let previously: Vec<ShardId> = {
            let attached = self.attached.lock().expect("bridge mutex poisoned");
            attached.iter().cloned().collect()
        };
        for shard_id in &previously {
            self.engine.detach(&alias_for(shard_id))?;
        }
        self.attached.lock().expect("bridge mutex poisoned").clear();
        self.sync_shards(active_shards)
    }

    /// Rewrites `sql` (referencing a virtual table name) into a federated
    /// `UNION ALL` over every attached shard and executes it once. Queries
    /// within the simple-aggregate envelope (§4.12) merge per-shard partials
    /// in-process instead, since `SUM`/`AVG`/etc. don't compose correctly
    /// under a naive row-level union.
    pub fn execute_federated(&self, sql: &str) -> MosaicResult<Vec<Value>> {
        let attached = self.attached.lock().expect("bridge mutex poisoned");
        if attached.is_empty() {
            return Ok(Vec::new());
        }

        let mut aliases: Vec<&ShardId> = attached.iter().collect();
        aliases.sort();

        if let Some(parsed) = parse_simple_aggregate(sql) {
            return self.execute_simple_aggregate(&parsed, &aliases);
        }

        let table = TABLE_REF
            .captures(sql)
            .map(|c| c[1].to_string())
            .ok_or_else(|| MosaicError::invalid_input("analytics query missing a FROM <table> reference"))?;

        let (inner_sql, outer_suffix) = split_outer_order_limit(sql);

        let subqueries: Vec<String> = aliases
            .iter()
            .map(|shard_id| {
                let alias = alias_for(shard_id);
                let rewritten = replace_table_reference(&inner_sql, &table, &format!("{alias}.{table}"));
                format!("SELECT * FROM ({rewritten})")
            })
            .collect();

        let federated_sql = format!(
            "WITH federated AS ({}) SELECT * FROM federated{}",
            subqueries.join(" UNION ALL "),
            outer_suffix
        );

        self.engine.execute(&federated_sql)
    }

    /// Runs a parsed simple-aggregate query per shard (each shard computing
    /// its own partial via the same aggregate function) and merges in Rust
    /// via [`crate::aggregate`], rather than asking the engine to merge rows
    /// it was never handed un-aggregated.
    fn execute_simple_aggregate(&self, parsed: &ParsedAggregate, aliases: &[&ShardId]) -> MosaicResult<Vec<Value>> {
        if let Some(group_col) = &parsed.group_by {
            let mut rows = Vec::new();
            for shard_id in aliases {
                let sql = build_shard_aggregate_sql(parsed, &alias_for(shard_id));
                for row in self.engine.execute(&sql)? {
                    let key = row.get("mosaicdb_group_key").cloned().unwrap_or(Value::Null);
                    let value = row.get("mosaicdb_agg_value").and_then(Value::as_f64);
                    rows.push(GroupedShardRow { key, value });
                }
            }
            let merged = merge_grouped(parsed.func, &rows, parsed.order, parsed.limit)?;
            Ok(merged
                .into_iter()
                .map(|(key, value)| {
                    let mut obj = Map::new();
                    obj.insert(group_col.clone(), key);
                    obj.insert(parsed.output_alias.clone(), value_to_json(value));
                    Value::Object(obj)
                })
                .collect())
        } else {
            let mut shard_aggs = Vec::with_capacity(aliases.len());
            for shard_id in aliases {
                let sql = build_shard_aggregate_sql(parsed, &alias_for(shard_id));
                let value = self
                    .engine
                    .execute(&sql)?
                    .first()
                    .and_then(|row| row.get("mosaicdb_agg_value"))
                    .and_then(Value::as_f64);
                shard_aggs.push(ShardAggregate { value, count: 0 });
            }
            let merged = merge_simple(parsed.func, &shard_aggs)?;
            let mut obj = Map::new();
            obj.insert(parsed.output_alias.clone(), value_to_json(merged));
            Ok(vec![Value::Object(obj)])
        }
    }
}

/// Renders a merged aggregate as JSON, preferring a whole-number integer
/// representation (`COUNT`/`SUM` over integer columns) over a float one so
/// callers see `20`, not `20.0`.
fn value_to_json(value: Option<f64>) -> Value {
    match value {
        None => Value::Null,
        Some(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Value::from(v as i64),
        Some(v) => serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
    }
}

/// Builds the per-shard query for a parsed simple aggregate, under fixed
/// column names so the merge step doesn't depend on the caller's own
/// (possibly absent) `AS` clause.
fn build_shard_aggregate_sql(parsed: &ParsedAggregate, alias: &str) -> String {
    let mut sql = match &parsed.group_by {
        Some(group_col) => format!(
            "SELECT {group_col} AS mosaicdb_group_key, {func}({target}) AS mosaicdb_agg_value FROM {alias}.{table}",
            func = parsed.func.as_str(),
            target = parsed.target,
            table = parsed.table,
        ),
        None => format!(
            "SELECT {func}({target}) AS mosaicdb_agg_value FROM {alias}.{table}",
            func = parsed.func.as_str(),
            target = parsed.target,
            table = parsed.table,
        ),
    };
    if let Some(where_clause) = &parsed.where_clause {
        sql.push_str(&format!(" WHERE {where_clause}"));
    }
    if let Some(group_col) = &parsed.group_by {
        sql.push_str(&format!(" GROUP BY {group_col}"));
    }
    sql
}

fn replace_table_reference(sql: &str, table: &str, replacement: &str) -> String {
    let pattern = Regex::new(&format!(r"(?i)\bFROM\s+{}\b", regex::escape(table))).unwrap();
    pattern.replace(sql, format!("FROM {replacement}")).into_owned()
}

/// Splits `sql` into `(body_without_outer_order_limit, outer_suffix)` where
/// `outer_suffix` is the trailing `ORDER BY ...`/`LIMIT ...` clause (if any),
/// preserved verbatim to re-attach to the federated wrapper.
fn split_outer_order_limit(sql: &str) -> (String, String) {
    let trimmed = sql.trim_end_matches(';').trim();
    if let Some(m) = OUTER_ORDER_LIMIT.find(trimmed) {
        if m.start() > 0 {
            let body = trimmed[..m.start()].to_string();
            let suffix = format!(" {}", trimmed[m.start()..].trim());
            return (body, suffix);
        }
    }
    (trimmed.to_string(), String::new())
}
