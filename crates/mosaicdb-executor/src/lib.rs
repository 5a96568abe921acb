//! Fan-out executor (C7): concurrent per-shard vector search with bounded
//! parallelism, an overall deadline, and partial-failure tolerance.
//!
//! Grounded on the teacher's `distributed::QueryCoordinator::query`:
//! a `Semaphore`-gated `tokio::spawn` per unit of work, joined with
//! `tokio::time::timeout`, logging and skipping failures rather than
//! aborting the whole query.

pub mod schema;

use std::sync::Arc;
use std::time::Duration;

use mosaicdb_core::{Candidate, Level, MosaicError, MosaicResult, ShardId};
use mosaicdb_pool::ConnectionPool;
use mosaicdb_search::RoutedShard;
use rusqlite::params;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use schema::register_vec_distance;

/// Per-shard fan-out request parameters, shared across all shards in a
/// single call to [`FanOutExecutor::execute`].
#[derive(Debug, Clone)]
pub struct FanOutQuery {
    pub level: Level,
    pub query_vector: Vec<f32>,
    /// Optional SQL predicate interpolated into the per-shard `WHERE`
    /// clause (hybrid-search path); trusted, pre-validated by the caller.
    pub sql_filter: Option<String>,
    /// Per-shard result cap `K`.
    pub per_shard_limit: usize,
    /// Overall deadline `T` across every shard.
    pub timeout: Duration,
}

/// Outcome of a fan-out call: the candidates gathered plus which shards
/// failed or timed out (for metrics/diagnostics), without failing the
/// whole query unless every shard failed.
#[derive(Debug)]
pub struct FanOutOutcome {
    pub candidates: Vec<Candidate>,
    pub failed_shards: Vec<ShardId>,
}

/// Bounded-parallelism executor over a set of candidate shards.
pub struct FanOutExecutor {
    pool: Arc<ConnectionPool>,
    permits: Arc<Semaphore>,
    /// Grace period after cancellation is signalled before a non-responsive
    /// handle is tainted rather than returned to the pool.
    cancel_grace: Duration,
}

impl FanOutExecutor {
    /// Creates an executor with bounded parallelism `F` (default 16).
    #[must_use]
    pub fn new(pool: Arc<ConnectionPool>, workers: usize, cancel_grace: Duration) -> Self {
        Self {
            pool,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            cancel_grace,
        }
    }

    /// Fans a query out across `shards`, honoring the overall timeout and
    /// returning [`MosaicError::AllShardsFailed`] only when every shard
    /// errored or timed out.
    pub async fn execute(&self, shards: &[RoutedShard], query: FanOutQuery) -> MosaicResult<FanOutOutcome> {
        let cancel = CancellationToken::new();
        let deadline = tokio::time::Instant::now() + query.timeout;

        let mut tasks = Vec::with_capacity(shards.len());
        for shard in shards {
            let permits = Arc::clone(&self.permits);
            let pool = Arc::clone(&self.pool);
            let cancel = cancel.clone();
            let shard_id = shard.shard_id.clone();
            let shard_path = shard.path.clone();
            let query = query.clone();
            let cancel_grace = self.cancel_grace;

            tasks.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.expect("semaphore not closed");
                if cancel.is_cancelled() {
                    return (shard_id, Err(MosaicError::timeout(0)));
                }
                let result = query_one_shard(pool, shard_id.clone(), shard_path, query, cancel, cancel_grace).await;
                (shard_id, result)
            }));
        }

        let result = tokio::time::timeout_at(deadline, join_all_tolerant(tasks)).await;

        let (mut candidates, mut failed) = (Vec::new(), Vec::new());
        match result {
            Ok(outcomes) => {
                for (shard_id, outcome) in outcomes {
                    match outcome {
                        Ok(rows) => candidates.extend(rows),
                        Err(e) => {
                            warn!(shard = %shard_id, error = %e, "shard query failed, skipping");
                            failed.push(shard_id);
                        }
                    }
                }
            }
            Err(_) => {
                cancel.cancel();
                warn!("fan-out deadline exceeded, cancelling in-flight shard queries");
                failed = shards.iter().map(|s| s.shard_id.clone()).collect();
            }
        }

        if candidates.is_empty() && !shards.is_empty() && failed.len() == shards.len() {
            return Err(MosaicError::all_shards_failed(shards.len(), failed.len()));
        }

        Ok(FanOutOutcome {
            candidates,
            failed_shards: failed,
        })
    }
}

async fn join_all_tolerant(
    tasks: Vec<tokio::task::JoinHandle<(ShardId, MosaicResult<Vec<Candidate>>)>>,
) -> Vec<(ShardId, MosaicResult<Vec<Candidate>>)> {
    let mut out = Vec::with_capacity(tasks.len());
    for task in tasks {
        match task.await {
            Ok(pair) => out.push(pair),
            Err(e) => {
                warn!(error = %e, "shard task panicked");
            }
        }
    }
    out
}

async fn query_one_shard(
    pool: Arc<ConnectionPool>,
    shard_id: ShardId,
    shard_path: String,
    query: FanOutQuery,
    cancel: CancellationToken,
    cancel_grace: Duration,
)
    -> MosaicResult<Vec<Candidate>> {
    let handle = pool.checkout(&shard_id, &shard_path)?;
    let interrupt = handle.connection().get_interrupt_handle();

    let watcher_shard_id = shard_id.clone();
    let watcher = tokio::spawn(async move {
        cancel.cancelled().await;
        tokio::time::sleep(cancel_grace).await;
        debug!(shard = %watcher_shard_id, "interrupting shard query after cancel grace period");
        interrupt.interrupt();
    });

    let blocking_shard_id = shard_id.clone();
    let (mut handle, result) = tokio::task::spawn_blocking(move || {
        let result = run_vector_query(handle.connection(), &blocking_shard_id, &query);
        (handle, result)
    })
    .await
    .map_err(|e| MosaicError::internal(format!("shard query task panicked: {e}")))?;

    watcher.abort();

    if result.is_err() {
        // An interrupted connection is left mid-statement; close it rather
        // than return it to the pool for reuse.
        handle.taint();
    }

    result
}

fn run_vector_query(conn: &rusqlite::Connection, shard_id: &ShardId, query: &FanOutQuery) -> MosaicResult<Vec<Candidate>> {
    register_vec_distance(conn)?;

    let embedding: Vec<u8> = query.query_vector.iter().flat_map(|f| f.to_le_bytes()).collect();
    let level_str = query.level.as_str();

    let sql = match &query.sql_filter {
        Some(filter) => format!(
            "SELECT id, doc_id, text, metadata, pagerank, vec_distance(embedding, ?1) AS distance
             FROM chunks
             WHERE level = ?2 AND ({filter})
             ORDER BY distance ASC
             LIMIT ?3"
        ),
        None => "SELECT id, doc_id, text, metadata, pagerank, vec_distance(embedding, ?1) AS distance
                  FROM chunks
                  WHERE level = ?2
                  ORDER BY distance ASC
                  LIMIT ?3"
            .to_string(),
    };

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![embedding, level_str, query.per_shard_limit as i64],
        |row| {
            let id: String = row.get(0)?;
            let doc_id: String = row.get(1)?;
            let text: String = row.get(2)?;
            let metadata_raw: String = row.get(3)?;
            let pagerank: f64 = row.get(4)?;
            let distance: f64 = row.get(5)?;
            Ok((id, doc_id, text, metadata_raw, pagerank, distance))
        },
    )?;

    let mut candidates = Vec::new();
    for row in rows {
        let (id, doc_id, text, metadata_raw, pagerank, distance) = row?;
        let metadata = match serde_json::from_str::<serde_json::Value>(&metadata_raw) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        candidates.push(Candidate {
            id,
            doc_id,
            shard_id: shard_id.clone(),
            text,
            metadata,
            pagerank: pagerank as f32,
            similarity: (1.0 / (1.0 + distance)) as f32,
        });
    }
    debug!(shard = %shard_id, hits = candidates.len(), "shard query complete");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaicdb_pool::PoolConfig;
    use schema::{create_test_shard_schema, insert_test_chunk};
    use tempfile::tempdir;

    fn shard(id: &str, path: &str) -> RoutedShard {
        RoutedShard {
            shard_id: ShardId::from(id),
            path: path.to_string(),
            query_count: 0,
            similarity: 1.0,
        }
    }

    fn base_query(vector: Vec<f32>) -> FanOutQuery {
        FanOutQuery {
            level: Level::Paragraph,
            query_vector: vector,
            sql_filter: None,
            per_shard_limit: 10,
            timeout: Duration::from_secs(5),
        }
    }

    fn seed_shard(path: &str) {
        let conn = rusqlite::Connection::open(path).unwrap();
        create_test_shard_schema(&conn).unwrap();
        insert_test_chunk(&conn, "c1", "d1", "paragraph", "hello world", 1.0, &[1.0, 0.0]).unwrap();
        insert_test_chunk(&conn, "c2", "d1", "paragraph", "goodbye world", 0.5, &[0.0, 1.0]).unwrap();
    }

    #[tokio::test]
    async fn fans_out_and_collects_candidates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shard1.db");
        seed_shard(path.to_str().unwrap());

        let pool = Arc::new(ConnectionPool::new(PoolConfig::default()));
        let executor = FanOutExecutor::new(pool, 4, Duration::from_millis(200));

        let shards = vec![shard("s1", path.to_str().unwrap())];
        let outcome = executor
            .execute(&shards, base_query(vec![1.0, 0.0]))
            .await
            .unwrap();

        assert_eq!(outcome.candidates.len(), 2);
        assert!(outcome.failed_shards.is_empty());
        // the closer embedding should score higher similarity
        let best = outcome
            .candidates
            .iter()
            .max_by(|a, b| a.similarity.partial_cmp(&b.similarity).unwrap())
            .unwrap();
        assert_eq!(best.id, "c1");
    }

    #[tokio::test]
    async fn missing_shard_file_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let good_path = dir.path().join("good.db");
        seed_shard(good_path.to_str().unwrap());

        let pool = Arc::new(ConnectionPool::new(PoolConfig::default()));
        let executor = FanOutExecutor::new(pool, 4, Duration::from_millis(200));

        let shards = vec![
            shard("good", good_path.to_str().unwrap()),
            shard("missing", "/nonexistent/path/shard.db"),
        ];
        let outcome = executor
            .execute(&shards, base_query(vec![1.0, 0.0]))
            .await
            .unwrap();

        assert_eq!(outcome.failed_shards.len(), 1);
        assert!(!outcome.candidates.is_empty());
    }

    #[tokio::test]
    async fn all_shards_failing_is_all_shards_failed() {
        let pool = Arc::new(ConnectionPool::new(PoolConfig::default()));
        let executor = FanOutExecutor::new(pool, 4, Duration::from_millis(200));

        let shards = vec![shard("missing", "/nonexistent/shard.db")];
        let err = executor
            .execute(&shards, base_query(vec![1.0, 0.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, MosaicError::AllShardsFailed { .. }));
    }

    #[tokio::test]
    async fn sql_filter_is_applied_per_shard() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shard1.db");
        seed_shard(path.to_str().unwrap());

        let pool = Arc::new(ConnectionPool::new(PoolConfig::default()));
        let executor = FanOutExecutor::new(pool, 4, Duration::from_millis(200));

        let mut query = base_query(vec![1.0, 0.0]);
        query.sql_filter = Some("doc_id = 'd1' AND text LIKE '%hello%'".to_string());

        let shards = vec![shard("s1", path.to_str().unwrap())];
        let outcome = executor.execute(&shards, query).await.unwrap();
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].id, "c1");
    }
}
