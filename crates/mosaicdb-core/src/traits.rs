//! Narrow traits for the collaborators the core consumes but does not
//! implement: the embedding producer and the per-shard storage engine.
//! Production backends (a real embedding model, a real SQLite/DuckDB-backed
//! shard) implement these; the core only depends on the trait object.

use async_trait::async_trait;

use crate::error::MosaicResult;

/// Turns text into a fixed-dimension dense vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Encodes a single piece of text.
    async fn encode(&self, text: &str) -> MosaicResult<Vec<f32>>;

    /// Encodes a batch of texts. The default implementation calls
    /// [`Embedder::encode`] sequentially; implementations with real batching
    /// support should override this.
    async fn encode_batch(&self, texts: &[String]) -> MosaicResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.encode(t).await?);
        }
        Ok(out)
    }

    /// Fixed output dimension this embedder produces.
    fn dimension(&self) -> usize;
}

/// Test/fallback embedder that always returns a zero vector, matching the
/// collaborator contract: "on failure/timeout the embedder returns a zero
/// vector and the caller is free to proceed".
pub struct ZeroVectorEmbedder {
    dimension: usize,
}

impl ZeroVectorEmbedder {
    /// Creates a zero-vector embedder producing vectors of the given dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for ZeroVectorEmbedder {
    async fn encode(&self, _text: &str) -> MosaicResult<Vec<f32>> {
        Ok(vec![0.0; self.dimension])
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_vector_embedder_returns_zeros() {
        let e = ZeroVectorEmbedder::new(4);
        let v = e.encode("anything").await.unwrap();
        assert_eq!(v, vec![0.0, 0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn default_encode_batch_calls_encode_sequentially() {
        let e = ZeroVectorEmbedder::new(2);
        let texts = vec!["a".to_string(), "b".to_string()];
        let out = e.encode_batch(&texts).await.unwrap();
        assert_eq!(out.len(), 2);
    }
}
