//! Persistent routing index (C3): the durable store of [`Shard`] and
//! [`ShardCentroid`] rows, backed by a `rusqlite` database with write-ahead
//! journaling, generous page-cache and mmap hints.
//!
//! A single write connection is guarded by a mutex; batched access-stat
//! updates are queued through a channel and flushed by a background task on
//! an interval, matching the "single-writer, many concurrent readers"
//! resource model: readers open their own short-lived connections, which
//! WAL mode allows to proceed concurrently with the writer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use mosaicdb_core::{Level, MosaicError, MosaicResult, RoutingEntry, Shard, ShardCentroid, ShardId, ShardStatus};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, warn};

use crate::codec::{decode_vector, encode_vector};

/// A shard registration request: metadata plus per-level centroids.
#[derive(Debug, Clone)]
pub struct ShardRegistration {
    pub shard: Shard,
    pub centroids: Vec<ShardCentroid>,
}

/// The persistent shard-routing index.
pub struct RoutingIndex {
    write_conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
    stat_tx: mpsc::UnboundedSender<(ShardId, i64)>,
}

impl RoutingIndex {
    /// Opens (or creates) a routing index at `path`, applying the storage
    /// tuning hints from the spec (WAL journaling, page-cache and mmap size
    /// hints) and starting the background stat-flush task.
    pub fn open<P: AsRef<Path>>(
        path: P,
        page_cache_mb: u64,
        mmap_size_mb: u64,
        flush_interval: std::time::Duration,
    ) -> MosaicResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        let conn = Connection::open(&db_path)?;
        Self::apply_pragmas(&conn, page_cache_mb, mmap_size_mb)?;
        Self::init_schema(&conn)?;

        let write_conn = Arc::new(Mutex::new(conn));
        let (stat_tx, mut stat_rx) = mpsc::unbounded_channel::<(ShardId, i64)>();

        let flush_conn = Arc::clone(&write_conn);
        tokio::spawn(async move {
            let mut ticker = interval(flush_interval);
            let mut pending: HashMap<ShardId, i64> = HashMap::new();
            loop {
                tokio::select! {
                    maybe_update = stat_rx.recv() => {
                        match maybe_update {
                            Some((id, delta)) => {
                                *pending.entry(id).or_insert(0) += delta;
                            }
                            None => {
                                flush_pending(&flush_conn, &mut pending);
                                break;
                            }
                        }
                    }
                    _ = ticker.tick() => {
                        flush_pending(&flush_conn, &mut pending);
                    }
                }
            }
        });

        Ok(Self {
            write_conn,
            db_path,
            stat_tx,
        })
    }

    /// Opens an in-memory routing index, primarily for tests.
    pub fn open_in_memory() -> MosaicResult<Self> {
        Self::open(
            ":memory:",
            128,
            256,
            std::time::Duration::from_millis(50),
        )
    }

    fn apply_pragmas(conn: &Connection, page_cache_mb: u64, mmap_size_mb: u64) -> MosaicResult<()> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        // cache_size is negative-KB when specified this way.
        let cache_kb = (page_cache_mb * 1024) as i64;
        conn.pragma_update(None, "cache_size", -cache_kb)?;
        let mmap_bytes = (mmap_size_mb * 1024 * 1024) as i64;
        // mmap_size is unsupported on some platforms; ignore failures.
        let _ = conn.pragma_update(None, "mmap_size", mmap_bytes);
        Ok(())
    }

    fn init_schema(conn: &Connection) -> MosaicResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS shards (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                doc_count INTEGER NOT NULL DEFAULT 0,
                query_count INTEGER NOT NULL DEFAULT 0,
                last_accessed TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                bloom_filter BLOB
            );

            CREATE TABLE IF NOT EXISTS shard_centroids (
                shard_id TEXT NOT NULL,
                level TEXT NOT NULL,
                centroid BLOB NOT NULL,
                centroid_norm REAL NOT NULL,
                PRIMARY KEY (shard_id, level),
                FOREIGN KEY (shard_id) REFERENCES shards(id)
            );

            CREATE INDEX IF NOT EXISTS idx_centroids_level ON shard_centroids(level);
            "#,
        )?;
        Ok(())
    }

    /// Inserts or replaces a shard's metadata, bloom filter, and all
    /// provided per-level centroids.
    pub fn register(&self, reg: &ShardRegistration) -> MosaicResult<()> {
        let mut conn = self.write_conn.lock();
        let tx = conn.transaction()?;
        {
            let status_str = status_to_str(reg.shard.status);
            let last_accessed = reg.shard.last_accessed.map(|t| t.to_rfc3339());
            tx.execute(
                "INSERT INTO shards (id, path, doc_count, query_count, last_accessed, status, bloom_filter)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    path = excluded.path,
                    doc_count = excluded.doc_count,
                    status = excluded.status,
                    bloom_filter = excluded.bloom_filter",
                params![
                    reg.shard.id.0,
                    reg.shard.path,
                    reg.shard.doc_count as i64,
                    reg.shard.query_count as i64,
                    last_accessed,
                    status_str,
                    reg.shard.bloom_filter,
                ],
            )?;

            for c in &reg.centroids {
                tx.execute(
                    "INSERT INTO shard_centroids (shard_id, level, centroid, centroid_norm)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(shard_id, level) DO UPDATE SET
                        centroid = excluded.centroid,
                        centroid_norm = excluded.centroid_norm",
                    params![
                        c.shard_id.0,
                        level_to_str(c.level),
                        encode_vector(&c.centroid),
                        c.centroid_norm as f64,
                    ],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Returns active shards that have a centroid at `level`, ordered by
    /// `query_count` descending.
    pub fn active_shards_at_level(&self, level: Level) -> MosaicResult<Vec<RoutingEntry>> {
        let conn = self.write_conn.lock();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.path, s.doc_count, s.query_count, s.last_accessed, s.status,
                    s.bloom_filter, c.centroid, c.centroid_norm
             FROM shards s
             JOIN shard_centroids c ON c.shard_id = s.id AND c.level = ?1
             WHERE s.status = 'active'
             ORDER BY s.query_count DESC, s.id ASC",
        )?;

        let level_str = level_to_str(level);
        let rows = stmt.query_map(params![level_str], |row| {
            let id: String = row.get(0)?;
            let path: String = row.get(1)?;
            let doc_count: i64 = row.get(2)?;
            let query_count: i64 = row.get(3)?;
            let last_accessed: Option<String> = row.get(4)?;
            let status: String = row.get(5)?;
            let bloom_filter: Option<Vec<u8>> = row.get(6)?;
            let centroid_bytes: Vec<u8> = row.get(7)?;
            let centroid_norm: f64 = row.get(8)?;
            Ok((
                id,
                path,
                doc_count,
                query_count,
                last_accessed,
                status,
                bloom_filter,
                centroid_bytes,
                centroid_norm,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, path, doc_count, query_count, last_accessed, status, bloom_filter, centroid_bytes, centroid_norm) =
                row?;
            let shard = Shard {
                id: ShardId(id.clone()),
                path,
                doc_count: doc_count.max(0) as u64,
                query_count: query_count.max(0) as u64,
                last_accessed: last_accessed.and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
                status: str_to_status(&status),
                bloom_filter,
            };
            let centroid = ShardCentroid {
                shard_id: ShardId(id),
                level,
                centroid: decode_vector(&centroid_bytes),
                centroid_norm: centroid_norm as f32,
            };
            let mut centroids = HashMap::new();
            centroids.insert(level, centroid);
            out.push(RoutingEntry { shard, centroids });
        }
        Ok(out)
    }

    /// Looks up a single shard's routing entry at `level`, if present and active.
    pub fn get_entry(&self, id: &ShardId, level: Level) -> MosaicResult<Option<RoutingEntry>> {
        let conn = self.write_conn.lock();
        let result: Option<(String, String, i64, i64, Option<String>, String, Option<Vec<u8>>, Vec<u8>, f64)> = conn
            .query_row(
                "SELECT s.id, s.path, s.doc_count, s.query_count, s.last_accessed, s.status,
                        s.bloom_filter, c.centroid, c.centroid_norm
                 FROM shards s
                 JOIN shard_centroids c ON c.shard_id = s.id AND c.level = ?2
                 WHERE s.id = ?1 AND s.status = 'active'",
                params![id.0, level_to_str(level)],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                    ))
                },
            )
            .optional()?;

        let Some((rid, path, doc_count, query_count, last_accessed, status, bloom_filter, centroid_bytes, centroid_norm)) = result else {
            return Ok(None);
        };
        let shard = Shard {
            id: ShardId(rid.clone()),
            path,
            doc_count: doc_count.max(0) as u64,
            query_count: query_count.max(0) as u64,
            last_accessed: last_accessed.and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
            status: str_to_status(&status),
            bloom_filter,
        };
        let centroid = ShardCentroid {
            shard_id: ShardId(rid.clone()),
            level,
            centroid: decode_vector(&centroid_bytes),
            centroid_norm: centroid_norm as f32,
        };
        let mut centroids = HashMap::new();
        centroids.insert(level, centroid);
        Ok(Some(RoutingEntry { shard, centroids }))
    }

    /// Queues a batched access-stat delta for `shard_id`; the background
    /// task periodically flushes accumulated deltas in one transaction.
    pub fn update_access_stats(&self, shard_id: ShardId, delta: i64) -> MosaicResult<()> {
        self.stat_tx
            .send((shard_id, delta))
            .map_err(|_| MosaicError::internal("routing index stat flush task has stopped"))
    }

    /// Atomically replaces a single centroid.
    pub fn update_centroid(&self, shard_id: &ShardId, level: Level, centroid: &[f32], centroid_norm: f32) -> MosaicResult<()> {
        let conn = self.write_conn.lock();
        conn.execute(
            "INSERT INTO shard_centroids (shard_id, level, centroid, centroid_norm)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(shard_id, level) DO UPDATE SET
                centroid = excluded.centroid,
                centroid_norm = excluded.centroid_norm",
            params![shard_id.0, level_to_str(level), encode_vector(centroid), centroid_norm as f64],
        )?;
        Ok(())
    }

    /// Total number of registered shards (any status), for metrics/`/shards`.
    pub fn shard_count(&self) -> MosaicResult<u64> {
        let conn = self.write_conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM shards", [], |r| r.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Lists every registered shard (any status) with its current stats,
    /// for the `/shards` admin surface.
    pub fn list_shards(&self) -> MosaicResult<Vec<Shard>> {
        let conn = self.write_conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, path, doc_count, query_count, last_accessed, status, bloom_filter
             FROM shards ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let path: String = row.get(1)?;
            let doc_count: i64 = row.get(2)?;
            let query_count: i64 = row.get(3)?;
            let last_accessed: Option<String> = row.get(4)?;
            let status: String = row.get(5)?;
            let bloom_filter: Option<Vec<u8>> = row.get(6)?;
            Ok((id, path, doc_count, query_count, last_accessed, status, bloom_filter))
        })?;

        let mut out = Vec::new();
        for r in rows {
            let (id, path, doc_count, query_count, last_accessed, status, bloom_filter) = r?;
            out.push(Shard {
                id: ShardId(id),
                path,
                doc_count: doc_count.max(0) as u64,
                query_count: query_count.max(0) as u64,
                last_accessed: last_accessed
                    .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
                    .map(|d| d.with_timezone(&Utc)),
                status: str_to_status(&status),
                bloom_filter,
            });
        }
        Ok(out)
    }

    /// Lists all active shard ids and paths, used by e.g. the analytics
    /// bridge to determine the attach set.
    pub fn active_shard_ids(&self) -> MosaicResult<Vec<(ShardId, String)>> {
        let conn = self.write_conn.lock();
        let mut stmt = conn.prepare("SELECT id, path FROM shards WHERE status = 'active' ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let path: String = row.get(1)?;
            Ok((ShardId(id), path))
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Path this index was opened from (for diagnostics).
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Forces an immediate flush of any pending access-stat deltas.
    /// Test-only helper since the background task normally handles this.
    #[cfg(any(test, feature = "test-util"))]
    pub async fn flush_stats_for_test(&self) {
        tokio::time::sleep(std::time::Duration::from_millis(120)).await;
    }
}

fn flush_pending(conn: &Mutex<Connection>, pending: &mut HashMap<ShardId, i64>) {
    if pending.is_empty() {
        return;
    }
    let conn = conn.lock();
    let now = Utc::now().to_rfc3339();
    for (id, delta) in pending.drain() {
        if let Err(e) = conn.execute(
            "UPDATE shards SET query_count = query_count + ?2, last_accessed = ?3 WHERE id = ?1",
            params![id.0, delta, now],
        ) {
            warn!(shard_id = %id, error = %e, "failed to flush access stats");
        } else {
            debug!(shard_id = %id, delta, "flushed access stats");
        }
    }
}

fn status_to_str(status: ShardStatus) -> &'static str {
    match status {
        ShardStatus::Active => "active",
        ShardStatus::Archived => "archived",
    }
}

fn str_to_status(s: &str) -> ShardStatus {
    match s {
        "archived" => ShardStatus::Archived,
        _ => ShardStatus::Active,
    }
}

fn level_to_str(level: Level) -> &'static str {
    level.as_str()
}
