//! Document ingestion: chunk, embed, persist.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AppError, EmbeddingError, ProviderError};
use crate::models::{ChunkEmbedding, ChunkingConfig, ProviderConfig};
use crate::store::DocumentStore;

use super::chunker::TextChunker;
use super::embedding::EmbeddingService;

/// Outcome of ingesting one source document.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestReport {
    pub chunks: usize,
    pub embedded_tokens: u32,
    pub embedding_model: String,
}

/// Turns raw source text into persisted chunks and embeddings.
///
/// Regeneration always replaces the full chunk set for a source. If the
/// configured embedding model is unavailable, ingestion retries once with
/// the fallback embedding model; the embedding service itself performs no
/// fallback.
pub struct IngestService {
    chunker: TextChunker,
    embedding: Arc<EmbeddingService>,
    store: Arc<dyn DocumentStore>,
    embedding_model: String,
    fallback_embedding_model: String,
}

impl IngestService {
    pub fn new(
        chunking: &ChunkingConfig,
        provider_config: &ProviderConfig,
        embedding: Arc<EmbeddingService>,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            chunker: TextChunker::new(chunking)?,
            embedding,
            store,
            embedding_model: provider_config.embedding_model.clone(),
            fallback_embedding_model: provider_config.fallback_embedding_model.clone(),
        })
    }

    /// Chunk and embed `text`, replacing everything stored for the source.
    pub async fn ingest_text(&self, source_id: &str, text: &str) -> Result<IngestReport, AppError> {
        let chunks = self.chunker.chunk(source_id, text);
        if chunks.is_empty() {
            // Nothing to index; clear any previous chunk set
            self.store.delete_source(source_id).await?;
            return Ok(IngestReport {
                chunks: 0,
                embedded_tokens: 0,
                embedding_model: self.embedding_model.clone(),
            });
        }

        let (embeddings, model) = self.embed_with_fallback(&chunks).await?;
        self.store
            .replace_chunks(source_id, &chunks, &embeddings)
            .await?;

        let embedded_tokens = chunks.iter().map(|c| c.token_count).sum();
        info!(
            source_id,
            chunks = chunks.len(),
            tokens = embedded_tokens,
            model = %model,
            "source ingested"
        );

        Ok(IngestReport {
            chunks: chunks.len(),
            embedded_tokens,
            embedding_model: model,
        })
    }

    /// Remove a source's chunks and embeddings.
    pub async fn delete_source(&self, source_id: &str) -> Result<(), AppError> {
        self.store.delete_source(source_id).await?;
        Ok(())
    }

    async fn embed_with_fallback(
        &self,
        chunks: &[crate::models::Chunk],
    ) -> Result<(Vec<ChunkEmbedding>, String), AppError> {
        match self.embedding.embed_chunks(chunks, &self.embedding_model).await {
            Ok(embeddings) => Ok((embeddings, self.embedding_model.clone())),
            Err(EmbeddingError::Provider(ProviderError::ModelNotFound(model))) => {
                warn!(
                    model = %model,
                    fallback = %self.fallback_embedding_model,
                    "embedding model unavailable, retrying with fallback"
                );
                let embeddings = self
                    .embedding
                    .embed_chunks(chunks, &self.fallback_embedding_model)
                    .await?;
                Ok((embeddings, self.fallback_embedding_model.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
