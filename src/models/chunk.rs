use serde::{Deserialize, Serialize};

use crate::utils::estimate_tokens;

/// A bounded slice of a source document's text.
///
/// Chunks are created in deterministic order during chunking, are immutable
/// once created, and are owned exclusively by their source document.
/// Re-processing a source deletes and recreates the full set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source_id: String,
    pub index: u32,
    pub content: String,
    pub token_count: u32,
}

impl Chunk {
    /// Deterministic chunk id derived from `(source_id, index)`.
    pub fn generate_id(source_id: &str, index: u32) -> String {
        use uuid::Uuid;
        let name = format!("{}:{}", source_id, index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    pub fn new(source_id: &str, index: u32, content: String) -> Self {
        let token_count = estimate_tokens(&content);
        Self {
            id: Self::generate_id(source_id, index),
            source_id: source_id.to_string(),
            index,
            content,
            token_count,
        }
    }
}

/// Embedding vector for a chunk, 1:1 with [`Chunk`], never mutated.
///
/// Tagged with the embedding model so that vectors from different models
/// are never compared against each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkEmbedding {
    pub chunk_id: String,
    pub model: String,
    pub vector: Vec<f32>,
}

/// A scored chunk produced by semantic retrieval.
///
/// Ephemeral: produced per query and consumed immediately by the prompt
/// builder, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub content: String,
    pub similarity: f32,
    pub token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_deterministic() {
        let a = Chunk::generate_id("src-1", 3);
        let b = Chunk::generate_id("src-1", 3);
        let c = Chunk::generate_id("src-1", 4);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn test_chunk_new_estimates_tokens() {
        let chunk = Chunk::new("src-1", 0, "x".repeat(10));
        assert_eq!(chunk.token_count, 3); // ceil(10 / 4)
        assert_eq!(chunk.index, 0);
        assert_eq!(chunk.source_id, "src-1");
    }
}
