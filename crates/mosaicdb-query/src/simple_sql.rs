//! The `simple_sql` dispatch path (C10): the same SQL runs against every
//! active shard in parallel, and the rows simply concatenate — no fusion,
//! no aggregate merge (that escalates to the analytics bridge instead).

use std::sync::Arc;

use mosaicdb_core::{MosaicError, MosaicResult, ShardId};
use mosaicdb_pool::ConnectionPool;
use serde_json::{Map, Value};

/// Runs `sql` against every `(ShardId, path)` pair concurrently, returning
/// every row (as a JSON object keyed by column name) concatenated in
/// arbitrary shard order. A shard that errors is skipped, matching the
/// fan-out executor's partial-failure tolerance; if every shard fails,
/// returns `AllShardsFailed`.
pub async fn execute_federated_simple(
    pool: Arc<ConnectionPool>,
    shards: &[(ShardId, String)],
    sql: String,
) -> MosaicResult<Vec<Value>> {
    let mut tasks = Vec::with_capacity(shards.len());
    for (shard_id, path) in shards {
        let pool = Arc::clone(&pool);
        let shard_id = shard_id.clone();
        let path = path.clone();
        let sql = sql.clone();
        tasks.push(tokio::spawn(async move {
            let handle = pool.checkout(&shard_id, &path)?;
            tokio::task::spawn_blocking(move || run_sql(handle.connection(), &sql))
                .await
                .map_err(|e| MosaicError::internal(format!("simple_sql task panicked: {e}")))?
        }));
    }

    let mut rows = Vec::new();
    let mut failures = 0usize;
    for task in tasks {
        match task.await {
            Ok(Ok(shard_rows)) => rows.extend(shard_rows),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "simple_sql shard query failed, skipping");
                failures += 1;
            }
            Err(e) => {
                tracing::warn!(error = %e, "simple_sql shard task join failed");
                failures += 1;
            }
        }
    }

    if !shards.is_empty() && failures == shards.len() {
        return Err(MosaicError::all_shards_failed(shards.len(), failures));
    }
    Ok(rows)
}

fn run_sql(conn: &rusqlite::Connection, sql: &str) -> MosaicResult<Vec<Value>> {
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
                rusqlite::types::ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
                rusqlite::types::ValueRef::Blob(b) => Value::String(format!("0x{}", hex_encode(b))),
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

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
