//! Document store boundary.
//!
//! Persistence for chunks, embeddings, cache entries, and difficulty
//! topics. The store only supports equality lookups and small membership
//! queries: callers must never assume arbitrary-size `IN`-style queries
//! and have to batch id lists at [`MAX_MEMBERSHIP_IDS`].

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{CacheEntry, Chunk, ChunkEmbedding, DifficultyTopic};

/// Maximum ids per membership query.
pub const MAX_MEMBERSHIP_IDS: usize = 10;

fn check_membership_len(ids: &[String]) -> Result<(), StoreError> {
    if ids.len() > MAX_MEMBERSHIP_IDS {
        return Err(StoreError::TooManyIds(ids.len()));
    }
    Ok(())
}

/// Persistence capability the pipeline runs against.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Replace all chunks and embeddings for a source.
    ///
    /// Regeneration deletes-then-recreates the full set; partial
    /// overwrites never happen.
    async fn replace_chunks(
        &self,
        source_id: &str,
        chunks: &[Chunk],
        embeddings: &[ChunkEmbedding],
    ) -> Result<(), StoreError>;

    /// Delete all chunks and embeddings owned by a source.
    async fn delete_source(&self, source_id: &str) -> Result<(), StoreError>;

    /// Chunk ids belonging to the given sources (≤ [`MAX_MEMBERSHIP_IDS`]).
    async fn chunk_ids_for_sources(&self, source_ids: &[String]) -> Result<Vec<String>, StoreError>;

    /// All chunks of one source in index order.
    async fn chunks_for_source(&self, source_id: &str) -> Result<Vec<Chunk>, StoreError>;

    /// Chunks with their embeddings for the given chunk ids
    /// (≤ [`MAX_MEMBERSHIP_IDS`]). Chunks without a stored embedding are
    /// omitted.
    async fn chunks_with_embeddings(
        &self,
        chunk_ids: &[String],
    ) -> Result<Vec<(Chunk, ChunkEmbedding)>, StoreError>;

    /// Whether any of the given sources (≤ [`MAX_MEMBERSHIP_IDS`]) has
    /// stored embeddings.
    async fn has_embeddings(&self, source_ids: &[String]) -> Result<bool, StoreError>;

    async fn get_cache_entry(
        &self,
        subject_id: &str,
        cache_type: &str,
    ) -> Result<Option<CacheEntry>, StoreError>;

    /// Insert or replace the entry for `(subject_id, cache_type)`.
    async fn upsert_cache_entry(&self, entry: &CacheEntry) -> Result<(), StoreError>;

    async fn delete_cache_entry(&self, subject_id: &str, cache_type: &str)
    -> Result<(), StoreError>;

    /// Remove expired cache rows and return them so the caller can
    /// best-effort delete the provider-side caches.
    async fn take_expired_cache_entries(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CacheEntry>, StoreError>;

    /// Unresolved difficulties for a learner, most severe first.
    async fn unresolved_difficulties(
        &self,
        user_id: &str,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<DifficultyTopic>, StoreError>;

    async fn find_difficulty(
        &self,
        user_id: &str,
        project_id: &str,
        topic: &str,
    ) -> Result<Option<DifficultyTopic>, StoreError>;

    /// Insert or update a difficulty by id.
    async fn put_difficulty(&self, difficulty: &DifficultyTopic) -> Result<(), StoreError>;
}
