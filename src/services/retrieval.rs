//! Semantic retrieval under a token budget.

use std::sync::Arc;

use tracing::debug;

use crate::error::RetrievalError;
use crate::models::{Chunk, ChunkEmbedding, RetrievalResult};
use crate::store::{DocumentStore, MAX_MEMBERSHIP_IDS};

use super::EmbeddingService;

/// Scores candidate chunks against a query and greedily accumulates the
/// most relevant ones under a token budget.
pub struct SemanticRetriever {
    embedding: Arc<EmbeddingService>,
    store: Arc<dyn DocumentStore>,
    similarity_threshold: f32,
}

impl SemanticRetriever {
    pub fn new(
        embedding: Arc<EmbeddingService>,
        store: Arc<dyn DocumentStore>,
        similarity_threshold: f32,
    ) -> Self {
        Self {
            embedding,
            store,
            similarity_threshold,
        }
    }

    /// Search the chunks of `source_ids` for content relevant to `query`.
    ///
    /// Results are sorted by similarity descending (ties broken by chunk
    /// index) and accumulated while the running token sum stays within
    /// `token_budget`; accumulation stops at the first candidate that
    /// would exceed it, since relevance order wins over packing. An empty
    /// result is a valid outcome, not an error: callers fall back to a
    /// non-semantic context strategy.
    pub async fn search(
        &self,
        query: &str,
        source_ids: &[String],
        token_budget: u32,
        model: &str,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        let query_vector = self.embedding.embed_query(query, model).await?;

        let candidates = self.fetch_candidates(source_ids).await?;
        if candidates.is_empty() {
            debug!(sources = source_ids.len(), "no candidate chunks");
            return Ok(Vec::new());
        }

        let mut scored: Vec<(Chunk, f32)> = Vec::with_capacity(candidates.len());
        for (chunk, embedding) in candidates {
            if embedding.model != model {
                return Err(RetrievalError::ModelMismatch {
                    chunk_id: chunk.id,
                    stored_model: embedding.model,
                    query_model: model.to_string(),
                });
            }
            let similarity = cosine_similarity(&query_vector, &embedding.vector);
            if similarity >= self.similarity_threshold {
                scored.push((chunk, similarity));
            }
        }

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.index.cmp(&b.0.index)));

        let mut results = Vec::new();
        let mut running_tokens = 0u32;
        for (chunk, similarity) in scored {
            if running_tokens + chunk.token_count > token_budget {
                debug!(
                    used = running_tokens,
                    budget = token_budget,
                    "token budget reached"
                );
                break;
            }
            running_tokens += chunk.token_count;
            results.push(RetrievalResult {
                chunk_id: chunk.id,
                content: chunk.content,
                similarity,
                token_count: chunk.token_count,
            });
        }

        debug!(
            results = results.len(),
            tokens = running_tokens,
            "retrieval complete"
        );
        Ok(results)
    }

    /// Run several targeted queries with an even budget split and
    /// de-duplicate the union by chunk id, keeping first-seen order.
    pub async fn search_many(
        &self,
        queries: &[String],
        source_ids: &[String],
        total_budget: u32,
        model: &str,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let per_query_budget = total_budget / queries.len() as u32;
        let mut seen = std::collections::HashSet::new();
        let mut combined = Vec::new();

        for query in queries {
            let results = self
                .search(query, source_ids, per_query_budget, model)
                .await?;
            for result in results {
                if seen.insert(result.chunk_id.clone()) {
                    combined.push(result);
                }
            }
        }

        Ok(combined)
    }

    /// Fetch `(chunk, embedding)` pairs through the store's small
    /// membership queries, batching ids at the store limit.
    async fn fetch_candidates(
        &self,
        source_ids: &[String],
    ) -> Result<Vec<(Chunk, ChunkEmbedding)>, RetrievalError> {
        let mut chunk_ids = Vec::new();
        for batch in source_ids.chunks(MAX_MEMBERSHIP_IDS) {
            chunk_ids.extend(self.store.chunk_ids_for_sources(batch).await?);
        }

        let mut candidates = Vec::with_capacity(chunk_ids.len());
        for batch in chunk_ids.chunks(MAX_MEMBERSHIP_IDS) {
            candidates.extend(self.store.chunks_with_embeddings(batch).await?);
        }
        Ok(candidates)
    }
}

/// Cosine similarity `dot(a,b) / (|a|·|b|)`.
///
/// Mismatched or zero-magnitude vectors score 0 rather than panicking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}
