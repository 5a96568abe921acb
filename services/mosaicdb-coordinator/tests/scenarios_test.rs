//! End-to-end tests for the six scenarios the coordinator must satisfy,
//! driven through the real `axum` router the way `akidb-api`'s `tests/`
//! suite exercises its own router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use mosaicdb_core::metrics::SHARD_UNAVAILABLE;
use mosaicdb_core::vector::norm;
use mosaicdb_core::{
    BloomFilter, Embedder, Level, MosaicConfig, MosaicResult, Shard, ShardCentroid, ShardId, ShardStatus,
};
use mosaicdb_coordinator::bootstrap::bootstrap;
use mosaicdb_coordinator::build_router;
use mosaicdb_routing::ShardRegistration;
use rusqlite::params;
use serde_json::{json, Value};
use tempfile::tempdir;
use tower::ServiceExt;

/// A deterministic stand-in for a real embedding model: encodes text into a
/// small bag-of-keywords vector so test fixtures can control similarity
/// ordering exactly, the way a production embedder would for real text.
struct KeywordEmbedder {
    keywords: Vec<&'static str>,
}

impl KeywordEmbedder {
    fn new(keywords: Vec<&'static str>) -> Self {
        Self { keywords }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .map(|kw| if lower.contains(kw) { 1.0 } else { 0.0 })
            .collect()
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn encode(&self, text: &str) -> MosaicResult<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    fn dimension(&self) -> usize {
        self.keywords.len()
    }
}

fn test_config(dimension: usize) -> MosaicConfig {
    let mut cfg = MosaicConfig::default();
    cfg.routing.dimension = dimension;
    cfg.routing.stat_flush_interval_ms = 20;
    cfg
}

fn shard_registration(id: &str, path: &str, level: Level, centroid: Vec<f32>, bloom: Option<BloomFilter>) -> ShardRegistration {
    let shard_id = ShardId::from(id);
    let centroid_norm = norm(&centroid);
    ShardRegistration {
        shard: Shard {
            id: shard_id.clone(),
            path: path.to_string(),
            doc_count: 1,
            query_count: 0,
            last_accessed: None,
            status: ShardStatus::Active,
            bloom_filter: bloom.map(|b| b.to_bytes()),
        },
        centroids: vec![ShardCentroid { shard_id, level, centroid, centroid_norm }],
    }
}

/// Seeds a shard database with the `chunks` table the fan-out executor
/// queries, optionally adding a `category` column for hybrid-filter tests.
fn seed_chunk_shard(path: &std::path::Path, with_category: bool, rows: &[(&str, &str, Option<&str>, Vec<f32>)]) {
    let conn = rusqlite::Connection::open(path).unwrap();
    let category_col = if with_category { ", category TEXT" } else { "" };
    conn.execute_batch(&format!(
        "CREATE TABLE chunks (
            id TEXT PRIMARY KEY,
            doc_id TEXT NOT NULL,
            parent_id TEXT,
            level TEXT NOT NULL,
            text TEXT NOT NULL,
            start_offset INTEGER NOT NULL,
            end_offset INTEGER NOT NULL,
            pagerank REAL NOT NULL DEFAULT 0,
            metadata TEXT NOT NULL DEFAULT '{{}}',
            embedding BLOB NOT NULL{category_col}
        );"
    ))
    .unwrap();

    for (id, text, category, embedding) in rows {
        let bytes: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
        if with_category {
            conn.execute(
                "INSERT INTO chunks (id, doc_id, parent_id, level, text, start_offset, end_offset, pagerank, metadata, embedding, category)
                 VALUES (?1, ?2, NULL, 'paragraph', ?3, 0, ?4, 0, '{}', ?5, ?6)",
                params![id, id, text, text.len() as i64, bytes, category.unwrap_or("")],
            )
            .unwrap();
        } else {
            conn.execute(
                "INSERT INTO chunks (id, doc_id, parent_id, level, text, start_offset, end_offset, pagerank, metadata, embedding)
                 VALUES (?1, ?2, NULL, 'paragraph', ?3, 0, ?4, 0, '{}', ?5)",
                params![id, id, text, text.len() as i64, bytes],
            )
            .unwrap();
        }
    }
}

fn seed_documents_shard(path: &std::path::Path, doc_count: u64) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch("CREATE TABLE documents (id INTEGER PRIMARY KEY);").unwrap();
    for i in 0..doc_count {
        conn.execute("INSERT INTO documents (id) VALUES (?1)", params![i as i64]).unwrap();
    }
}

async fn post_json(router: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .method("POST")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = serde_json::from_slice(&bytes).unwrap();
    (status, parsed)
}

#[tokio::test]
async fn empty_corpus_returns_no_results() {
    let dir = tempdir().unwrap();
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new(vec!["anything"]));
    let state = bootstrap(test_config(1), dir.path(), embedder).unwrap();
    let router = build_router(state);

    let (status, body) = post_json(&router, "/search", json!({"query": "anything"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], json!([]));
    assert_eq!(body["path"], "hot");
}

#[tokio::test]
async fn single_shard_three_documents_ranks_closest_match_first() {
    let dir = tempdir().unwrap();
    let shard_path = dir.path().join("shard1.db");
    seed_chunk_shard(
        &shard_path,
        false,
        &[
            ("d1", "cat", None, vec![1.0, 0.0, 0.0]),
            ("d2", "dog", None, vec![0.0, 1.0, 0.0]),
            ("d3", "fish", None, vec![0.0, 0.0, 1.0]),
        ],
    );

    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new(vec!["cat", "dog", "fish"]));
    let state = bootstrap(test_config(3), dir.path(), embedder).unwrap();
    state
        .register_shard(shard_registration(
            "s1",
            shard_path.to_str().unwrap(),
            Level::Paragraph,
            vec![1.0, 1.0, 1.0],
            None,
        ))
        .await
        .unwrap();
    let router = build_router(state);

    let (status, body) = post_json(
        &router,
        "/search",
        json!({"query": "dog", "limit": 2, "min_similarity": 0.0}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["candidate"]["id"], "d2");
}

#[tokio::test]
async fn two_shard_hybrid_filters_to_one_category() {
    let dir = tempdir().unwrap();
    let path_a = dir.path().join("shardA.db");
    let path_b = dir.path().join("shardB.db");
    seed_chunk_shard(
        &path_a,
        true,
        &[("p1", "premium quality electronics", Some("electronics"), vec![1.0, 1.0])],
    );
    seed_chunk_shard(
        &path_b,
        true,
        &[("p2", "premium quality books", Some("books"), vec![1.0, 1.0])],
    );

    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new(vec!["premium", "quality"]));
    let state = bootstrap(test_config(2), dir.path(), embedder).unwrap();
    state
        .register_shard(shard_registration("a", path_a.to_str().unwrap(), Level::Paragraph, vec![1.0, 1.0], None))
        .await
        .unwrap();
    state
        .register_shard(shard_registration("b", path_b.to_str().unwrap(), Level::Paragraph, vec![1.0, 1.0], None))
        .await
        .unwrap();
    let router = build_router(state);

    let (status, body) = post_json(
        &router,
        "/search/hybrid",
        json!({"query": "premium quality", "where": "category='electronics'", "limit": 5}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["candidate"]["id"], "p1");
}

#[tokio::test]
async fn analytics_federation_sums_shard_document_counts() {
    let dir = tempdir().unwrap();
    let paths: Vec<_> = [4u64, 7, 9]
        .iter()
        .enumerate()
        .map(|(i, count)| {
            let path = dir.path().join(format!("shard{i}.db"));
            seed_documents_shard(&path, *count);
            path
        })
        .collect();

    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new(vec!["x"]));
    let state = bootstrap(test_config(1), dir.path(), embedder).unwrap();
    for (i, path) in paths.iter().enumerate() {
        state
            .register_shard(shard_registration(&format!("s{i}"), path.to_str().unwrap(), Level::Document, vec![1.0], None))
            .await
            .unwrap();
    }
    let router = build_router(state);

    let (status, body) = post_json(&router, "/analytics", json!({"sql": "SELECT COUNT(*) FROM documents"})).await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["count"], 20);
    assert_eq!(body["path"], "warm");
}

#[tokio::test]
async fn bloom_pruning_skips_shard_without_term() {
    let dir = tempdir().unwrap();
    let path_a = dir.path().join("shardA.db");
    let path_b = dir.path().join("shardB.db");
    seed_chunk_shard(&path_a, false, &[("a1", "mosaic databases", None, vec![1.0])]);
    seed_chunk_shard(&path_b, false, &[("b1", "unrelated content", None, vec![1.0])]);

    let mut bloom_a = BloomFilter::with_defaults();
    bloom_a.add("mosaic");
    let bloom_b = BloomFilter::with_defaults();

    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new(vec!["mosaic"]));
    let state = bootstrap(test_config(1), dir.path(), embedder).unwrap();
    state
        .register_shard(shard_registration("a", path_a.to_str().unwrap(), Level::Paragraph, vec![1.0], Some(bloom_a)))
        .await
        .unwrap();
    state
        .register_shard(shard_registration("b", path_b.to_str().unwrap(), Level::Paragraph, vec![1.0], Some(bloom_b)))
        .await
        .unwrap();
    let router = build_router(state.clone());

    let (status, _body) = post_json(
        &router,
        "/search",
        json!({"query": "mosaic databases", "limit": 10, "query_terms": ["mosaic"]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // let the batched access-stat writer flush before inspecting counters.
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    let shards = state.routing_index.list_shards().unwrap();
    let shard_a = shards.iter().find(|s| s.id == ShardId::from("a")).unwrap();
    let shard_b = shards.iter().find(|s| s.id == ShardId::from("b")).unwrap();
    assert_eq!(shard_a.query_count, 1);
    assert_eq!(shard_b.query_count, 0);
}

#[tokio::test]
async fn partial_shard_failure_skips_unavailable_shard_without_surfacing_an_error() {
    let dir = tempdir().unwrap();
    let path1 = dir.path().join("shard1.db");
    let path3 = dir.path().join("shard3.db");
    seed_chunk_shard(&path1, false, &[("c1", "hello world", None, vec![1.0])]);
    seed_chunk_shard(&path3, false, &[("c3", "hello again", None, vec![1.0])]);

    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new(vec!["hello"]));
    let state = bootstrap(test_config(1), dir.path(), embedder).unwrap();
    state
        .register_shard(shard_registration("shard1", path1.to_str().unwrap(), Level::Paragraph, vec![1.0], None))
        .await
        .unwrap();
    state
        .register_shard(shard_registration(
            "shard2",
            "/nonexistent/path/shard2.db",
            Level::Paragraph,
            vec![1.0],
            None,
        ))
        .await
        .unwrap();
    state
        .register_shard(shard_registration("shard3", path3.to_str().unwrap(), Level::Paragraph, vec![1.0], None))
        .await
        .unwrap();

    let before = SHARD_UNAVAILABLE.get();
    let router = build_router(state);

    let (status, body) = post_json(&router, "/search", json!({"query": "hello", "limit": 10})).await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r["candidate"]["id"].as_str().unwrap()).collect();
    assert!(ids.contains(&"c1"));
    assert!(ids.contains(&"c3"));

    let after = SHARD_UNAVAILABLE.get();
    assert_eq!(after - before, 1);
}
