//! Per-shard reusable storage handles (C5).
//!
//! Each shard gets its own bounded free-list of opened `rusqlite`
//! connections, capped at `P` handles (default 5). [`ConnectionPool::checkout`]
//! returns an existing healthy handle if one is free, else opens a new one
//! (loading the vector-search extension when configured, and applying
//! tuning parameters: busy timeout, journaling mode, memory-mapped I/O).
//! A handle is exclusively owned by its borrower once checked out; the
//! returned [`PooledHandle`] guarantees close-on-drop on every exit path.

use std::collections::HashMap;
use std::sync::Arc;

use mosaicdb_core::{MosaicError, MosaicResult, ShardId};
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{debug, warn};

/// Tuning knobs applied to every freshly opened shard connection.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum pooled handles per shard, `P`.
    pub max_handles_per_shard: usize,
    /// `PRAGMA busy_timeout` in milliseconds.
    pub busy_timeout_ms: u32,
    /// Optional path to a vector-search SQLite extension to load on open.
    pub vector_extension_path: Option<String>,
    /// Memory-mapped I/O hint in bytes, `0` disables.
    pub mmap_size_bytes: i64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_handles_per_shard: 5,
            busy_timeout_ms: 5000,
            vector_extension_path: None,
            mmap_size_bytes: 256 * 1024 * 1024,
        }
    }
}

type FreeList = Arc<Mutex<Vec<Connection>>>;

/// Per-shard pool of reusable `rusqlite` connections.
pub struct ConnectionPool {
    config: PoolConfig,
    shards: Mutex<HashMap<ShardId, FreeList>>,
}

impl ConnectionPool {
    /// Creates an empty pool with the given configuration.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            shards: Mutex::new(HashMap::new()),
        }
    }

    fn free_list_for(&self, shard_id: &ShardId) -> FreeList {
        let mut shards = self.shards.lock();
        shards
            .entry(shard_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }

    /// Checks out a healthy handle for `shard_path`, reusing a pooled
    /// connection when available and healthy (probed with a trivial
    /// query), otherwise opening and tuning a new one.
    pub fn checkout(&self, shard_id: &ShardId, shard_path: &str) -> MosaicResult<PooledHandle> {
        let free_list = self.free_list_for(shard_id);

        loop {
            let candidate = {
                let mut list = free_list.lock();
                list.pop()
            };
            match candidate {
                Some(conn) => {
                    if probe_healthy(&conn) {
                        return Ok(PooledHandle {
                            conn: Some(conn),
                            free_list: Arc::clone(&free_list),
                            max_per_shard: self.config.max_handles_per_shard,
                        });
                    }
                    debug!(shard = %shard_id, "discarding unhealthy pooled handle");
                    // conn drops here, closing it.
                }
                None => {
                    let conn = open_tuned_connection(shard_path, &self.config)?;
                    return Ok(PooledHandle {
                        conn: Some(conn),
                        free_list: Arc::clone(&free_list),
                        max_per_shard: self.config.max_handles_per_shard,
                    });
                }
            }
        }
    }

    /// Number of idle (checked-in) handles currently pooled for `shard_id`.
    #[must_use]
    pub fn idle_count(&self, shard_id: &ShardId) -> usize {
        let shards = self.shards.lock();
        shards
            .get(shard_id)
            .map(|list| list.lock().len())
            .unwrap_or(0)
    }
}

fn open_tuned_connection(shard_path: &str, config: &PoolConfig) -> MosaicResult<Connection> {
    let conn = Connection::open(shard_path)
        .map_err(|e| MosaicError::internal(format!("failed to open shard {shard_path}: {e}")))?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
    conn.busy_timeout(std::time::Duration::from_millis(u64::from(config.busy_timeout_ms)))?;
    if config.mmap_size_bytes > 0 {
        let _ = conn.pragma_update(None, "mmap_size", config.mmap_size_bytes);
    }

    if let Some(ext_path) = &config.vector_extension_path {
        // SAFETY: loading a configured, trusted extension path at pool
        // startup; callers control `vector_extension_path`.
        unsafe {
            conn.load_extension_enable()
                .map_err(|e| MosaicError::internal(format!("load_extension_enable failed: {e}")))?;
            let load_result = conn.load_extension(ext_path, None::<&str>);
            let _ = conn.load_extension_disable();
            load_result.map_err(|e| {
                MosaicError::internal(format!("failed to load vector extension {ext_path}: {e}"))
            })?;
        }
    }

    Ok(conn)
}

fn probe_healthy(conn: &Connection) -> bool {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .map(|v| v == 1)
        .unwrap_or_else(|e| {
            warn!(error = %e, "health probe failed for pooled handle");
            false
        })
}

/// A checked-out shard connection. Exclusively owned by the borrowing task;
/// dropping it returns the handle to the pool (or closes it, if the pool is
/// already at capacity for that shard).
pub struct PooledHandle {
    conn: Option<Connection>,
    free_list: FreeList,
    max_per_shard: usize,
}

impl PooledHandle {
    /// Borrows the underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        self.conn.as_ref().expect("connection taken from live handle")
    }

    /// Marks this handle as tainted, so it is closed rather than returned to
    /// the pool on drop. Used when a sub-task fails to observe cancellation
    /// within the executor's grace period.
    pub fn taint(&mut self) {
        self.conn = None;
    }
}

impl Drop for PooledHandle {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let mut list = self.free_list.lock();
            if list.len() < self.max_per_shard {
                list.push(conn);
            }
            // else: conn is dropped here, closing the underlying handle.
        }
    }
}
