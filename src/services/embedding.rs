//! Embedding generation with sub-batching and backoff.

use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use tracing::debug;

use crate::error::EmbeddingError;
use crate::models::{Chunk, ChunkEmbedding, EmbeddingConfig};
use crate::provider::LanguageModelProvider;
use crate::utils::retry::{RetryConfig, with_retry};

/// Generates embeddings through the provider.
///
/// Chunks are processed in fixed-size sub-batches: calls within a
/// sub-batch run concurrently, sub-batches run sequentially with a fixed
/// delay in between to respect provider rate limits. A failure anywhere
/// aborts the whole call; callers must not assume partial success.
///
/// Model fallback is deliberately not handled here: on `ModelNotFound`
/// the ingest caller retries once with its fallback embedding model.
pub struct EmbeddingService {
    provider: Arc<dyn LanguageModelProvider>,
    batch_size: usize,
    batch_delay: Duration,
    retry: RetryConfig,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn LanguageModelProvider>, config: &EmbeddingConfig) -> Self {
        Self {
            provider,
            batch_size: config.batch_size.max(1),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            retry: RetryConfig::default(),
        }
    }

    /// Embed every chunk, tagging vectors with the model that produced them.
    pub async fn embed_chunks(
        &self,
        chunks: &[Chunk],
        model: &str,
    ) -> Result<Vec<ChunkEmbedding>, EmbeddingError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let total_batches = chunks.len().div_ceil(self.batch_size);
        let mut embeddings = Vec::with_capacity(chunks.len());
        let mut expected_dim: Option<usize> = None;

        for (batch_index, batch) in chunks.chunks(self.batch_size).enumerate() {
            debug!(
                batch = batch_index + 1,
                total_batches,
                size = batch.len(),
                "embedding sub-batch"
            );

            let vectors = try_join_all(batch.iter().map(|chunk| self.embed_text(&chunk.content, model)))
                .await?;

            for (chunk, vector) in batch.iter().zip(vectors) {
                let dim = expected_dim.get_or_insert(vector.len());
                if vector.len() != *dim {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: *dim,
                        actual: vector.len(),
                    });
                }
                embeddings.push(ChunkEmbedding {
                    chunk_id: chunk.id.clone(),
                    model: model.to_string(),
                    vector,
                });
            }

            if batch_index + 1 < total_batches {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        debug!(count = embeddings.len(), model, "all embeddings generated");
        Ok(embeddings)
    }

    /// Embed a single query string.
    pub async fn embed_query(&self, text: &str, model: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_text(text, model).await
    }

    async fn embed_text(&self, text: &str, model: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vector = with_retry(&self.retry, || self.provider.embed(text, model)).await?;
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::{Completion, CompletionRequest, ProviderCache};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider double that derives vectors from text length.
    struct FakeProvider {
        calls: AtomicUsize,
        fail_on: Option<usize>,
        dims: fn(usize) -> usize,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on: None,
                dims: |_| 3,
            }
        }
    }

    #[async_trait]
    impl LanguageModelProvider for FakeProvider {
        async fn complete(
            &self,
            _request: CompletionRequest<'_>,
        ) -> Result<Completion, ProviderError> {
            unimplemented!("not used in embedding tests")
        }

        async fn embed(&self, text: &str, _model: &str) -> Result<Vec<f32>, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(call) {
                return Err(ProviderError::Api {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(vec![text.len() as f32; (self.dims)(call)])
        }

        async fn create_cache(
            &self,
            _content: &str,
            _model: &str,
            _ttl: Duration,
        ) -> Result<ProviderCache, ProviderError> {
            unimplemented!("not used in embedding tests")
        }

        async fn cache_exists(&self, _handle: &str) -> Result<bool, ProviderError> {
            Ok(true)
        }

        async fn delete_cache(&self, _handle: &str) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            batch_size: 10,
            batch_delay_ms: 0,
        }
    }

    fn chunks(count: usize) -> Vec<Chunk> {
        (0..count)
            .map(|i| Chunk::new("s1", i as u32, format!("chunk content {i}")))
            .collect()
    }

    #[tokio::test]
    async fn test_embeds_all_chunks_in_order() {
        let provider = Arc::new(FakeProvider::new());
        let service = EmbeddingService::new(provider.clone(), &config());

        let input = chunks(25);
        let embeddings = service.embed_chunks(&input, "embed-001").await.unwrap();

        assert_eq!(embeddings.len(), 25);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 25);
        for (chunk, embedding) in input.iter().zip(&embeddings) {
            assert_eq!(embedding.chunk_id, chunk.id);
            assert_eq!(embedding.model, "embed-001");
        }
    }

    #[tokio::test]
    async fn test_failure_aborts_whole_call() {
        let provider = Arc::new(FakeProvider {
            calls: AtomicUsize::new(0),
            fail_on: Some(12),
            dims: |_| 3,
        });
        let service = EmbeddingService::new(provider, &config());

        let result = service.embed_chunks(&chunks(25), "embed-001").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let provider = Arc::new(FakeProvider {
            calls: AtomicUsize::new(0),
            fail_on: None,
            dims: |call| if call == 0 { 3 } else { 4 },
        });
        let service = EmbeddingService::new(provider, &config());

        let result = service.embed_chunks(&chunks(2), "embed-001").await;
        assert!(matches!(
            result,
            Err(EmbeddingError::DimensionMismatch { expected: 3, actual: 4 })
        ));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let service = EmbeddingService::new(Arc::new(FakeProvider::new()), &config());
        let embeddings = service.embed_chunks(&[], "embed-001").await.unwrap();
        assert!(embeddings.is_empty());
    }
}
