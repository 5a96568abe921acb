//! The per-shard SQL surface the executor queries against.
//!
//! Shard storage is an external collaborator (spec'd only by the SQL it
//! must support); this module registers the one piece every shard is
//! assumed to provide — a `vec_distance(embedding, query)` scalar function
//! — so the executor's query can run against a plain `rusqlite` connection
//! without a native vector-search extension installed. Production shards
//! that load a real extension simply shadow this registration.

use mosaicdb_core::vector::cosine_similarity_raw;
use mosaicdb_core::MosaicResult;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

/// Registers the `vec_distance(a, b)` scalar function, computing
/// `1 - cosine_similarity(a, b)` over two little-endian `f32` BLOBs.
/// Idempotent: re-registering on an already-tuned connection is a no-op.
pub fn register_vec_distance(conn: &Connection) -> MosaicResult<()> {
    conn.create_scalar_function(
        "vec_distance",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let a: Vec<u8> = ctx.get(0)?;
            let b: Vec<u8> = ctx.get(1)?;
            let va = decode_embedding(&a);
            let vb = decode_embedding(&b);
            let sim = cosine_similarity_raw(&va, &vb).unwrap_or(0.0);
            Ok(1.0 - f64::from(sim))
        },
    )?;
    Ok(())
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    // mirrors mosaicdb_routing::codec::decode_vector; kept local so the
    // executor doesn't need a dependency on mosaicdb-routing for one helper.
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Creates the chunks/vector-index schema a shard is expected to expose, for
/// tests that stand up an in-memory shard rather than a real one.
#[cfg(any(test, feature = "test-util"))]
pub fn create_test_shard_schema(conn: &Connection) -> MosaicResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE chunks (
            id TEXT PRIMARY KEY,
            doc_id TEXT NOT NULL,
            parent_id TEXT,
            level TEXT NOT NULL,
            text TEXT NOT NULL,
            start_offset INTEGER NOT NULL,
            end_offset INTEGER NOT NULL,
            pagerank REAL NOT NULL DEFAULT 0,
            metadata TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL
        );
        "#,
    )?;
    Ok(())
}

#[cfg(any(test, feature = "test-util"))]
pub fn insert_test_chunk(
    conn: &Connection,
    id: &str,
    doc_id: &str,
    level: &str,
    text: &str,
    pagerank: f32,
    embedding: &[f32],
) -> MosaicResult<()> {
    let bytes: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
    conn.execute(
        "INSERT INTO chunks (id, doc_id, parent_id, level, text, start_offset, end_offset, pagerank, metadata, embedding)
         VALUES (?1, ?2, NULL, ?3, ?4, 0, ?5, ?6, '{}', ?7)",
        rusqlite::params![id, doc_id, level, text, text.len() as i64, pagerank, bytes],
    )?;
    Ok(())
}
