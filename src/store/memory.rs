//! In-memory [`DocumentStore`] for tests and development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{CacheEntry, Chunk, ChunkEmbedding, DifficultyTopic};

use super::{DocumentStore, check_membership_len};

/// In-memory store backed by `RwLock`ed maps.
#[derive(Default)]
pub struct MemoryStore {
    chunks: RwLock<Vec<Chunk>>,
    embeddings: RwLock<HashMap<String, ChunkEmbedding>>,
    cache_entries: RwLock<HashMap<(String, String), CacheEntry>>,
    difficulties: RwLock<Vec<DifficultyTopic>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn replace_chunks(
        &self,
        source_id: &str,
        chunks: &[Chunk],
        embeddings: &[ChunkEmbedding],
    ) -> Result<(), StoreError> {
        {
            let mut stored = self.chunks.write().unwrap();
            stored.retain(|c| c.source_id != source_id);
            stored.extend(chunks.iter().cloned());
        }
        let chunk_ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        let mut stored = self.embeddings.write().unwrap();
        stored.retain(|id, _| !chunk_ids.contains(&id.as_str()));
        for embedding in embeddings {
            stored.insert(embedding.chunk_id.clone(), embedding.clone());
        }
        Ok(())
    }

    async fn delete_source(&self, source_id: &str) -> Result<(), StoreError> {
        let removed: Vec<String> = {
            let mut stored = self.chunks.write().unwrap();
            let removed = stored
                .iter()
                .filter(|c| c.source_id == source_id)
                .map(|c| c.id.clone())
                .collect();
            stored.retain(|c| c.source_id != source_id);
            removed
        };
        let mut embeddings = self.embeddings.write().unwrap();
        for id in removed {
            embeddings.remove(&id);
        }
        Ok(())
    }

    async fn chunk_ids_for_sources(&self, source_ids: &[String]) -> Result<Vec<String>, StoreError> {
        check_membership_len(source_ids)?;
        let stored = self.chunks.read().unwrap();
        Ok(stored
            .iter()
            .filter(|c| source_ids.contains(&c.source_id))
            .map(|c| c.id.clone())
            .collect())
    }

    async fn chunks_for_source(&self, source_id: &str) -> Result<Vec<Chunk>, StoreError> {
        let stored = self.chunks.read().unwrap();
        let mut chunks: Vec<Chunk> = stored
            .iter()
            .filter(|c| c.source_id == source_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.index);
        Ok(chunks)
    }

    async fn chunks_with_embeddings(
        &self,
        chunk_ids: &[String],
    ) -> Result<Vec<(Chunk, ChunkEmbedding)>, StoreError> {
        check_membership_len(chunk_ids)?;
        let chunks = self.chunks.read().unwrap();
        let embeddings = self.embeddings.read().unwrap();
        Ok(chunk_ids
            .iter()
            .filter_map(|id| {
                let chunk = chunks.iter().find(|c| &c.id == id)?;
                let embedding = embeddings.get(id)?;
                Some((chunk.clone(), embedding.clone()))
            })
            .collect())
    }

    async fn has_embeddings(&self, source_ids: &[String]) -> Result<bool, StoreError> {
        check_membership_len(source_ids)?;
        let chunks = self.chunks.read().unwrap();
        let embeddings = self.embeddings.read().unwrap();
        Ok(chunks
            .iter()
            .any(|c| source_ids.contains(&c.source_id) && embeddings.contains_key(&c.id)))
    }

    async fn get_cache_entry(
        &self,
        subject_id: &str,
        cache_type: &str,
    ) -> Result<Option<CacheEntry>, StoreError> {
        let entries = self.cache_entries.read().unwrap();
        Ok(entries
            .get(&(subject_id.to_string(), cache_type.to_string()))
            .cloned())
    }

    async fn upsert_cache_entry(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        let mut entries = self.cache_entries.write().unwrap();
        entries.insert(
            (entry.subject_id.clone(), entry.cache_type.clone()),
            entry.clone(),
        );
        Ok(())
    }

    async fn delete_cache_entry(
        &self,
        subject_id: &str,
        cache_type: &str,
    ) -> Result<(), StoreError> {
        let mut entries = self.cache_entries.write().unwrap();
        entries.remove(&(subject_id.to_string(), cache_type.to_string()));
        Ok(())
    }

    async fn take_expired_cache_entries(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CacheEntry>, StoreError> {
        let mut entries = self.cache_entries.write().unwrap();
        let expired: Vec<CacheEntry> = entries
            .values()
            .filter(|e| e.is_expired(now))
            .cloned()
            .collect();
        entries.retain(|_, e| !e.is_expired(now));
        Ok(expired)
    }

    async fn unresolved_difficulties(
        &self,
        user_id: &str,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<DifficultyTopic>, StoreError> {
        let stored = self.difficulties.read().unwrap();
        let mut unresolved: Vec<DifficultyTopic> = stored
            .iter()
            .filter(|d| d.user_id == user_id && d.project_id == project_id && !d.resolved)
            .cloned()
            .collect();
        unresolved.sort_by(|a, b| b.level.cmp(&a.level));
        unresolved.truncate(limit);
        Ok(unresolved)
    }

    async fn find_difficulty(
        &self,
        user_id: &str,
        project_id: &str,
        topic: &str,
    ) -> Result<Option<DifficultyTopic>, StoreError> {
        let stored = self.difficulties.read().unwrap();
        Ok(stored
            .iter()
            .find(|d| {
                d.user_id == user_id
                    && d.project_id == project_id
                    && d.topic.eq_ignore_ascii_case(topic)
            })
            .cloned())
    }

    async fn put_difficulty(&self, difficulty: &DifficultyTopic) -> Result<(), StoreError> {
        let mut stored = self.difficulties.write().unwrap();
        match stored.iter_mut().find(|d| d.id == difficulty.id) {
            Some(existing) => *existing = difficulty.clone(),
            None => stored.push(difficulty.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MAX_MEMBERSHIP_IDS;
    use chrono::Duration;

    fn chunk(source: &str, index: u32) -> Chunk {
        Chunk::new(source, index, format!("content of chunk {index}"))
    }

    fn embedding(chunk: &Chunk) -> ChunkEmbedding {
        ChunkEmbedding {
            chunk_id: chunk.id.clone(),
            model: "embed-001".to_string(),
            vector: vec![1.0, 0.0],
        }
    }

    #[tokio::test]
    async fn test_replace_chunks_deletes_then_recreates() {
        let store = MemoryStore::new();
        let old = vec![chunk("s1", 0), chunk("s1", 1)];
        let old_embeddings: Vec<_> = old.iter().map(embedding).collect();
        store
            .replace_chunks("s1", &old, &old_embeddings)
            .await
            .unwrap();

        let new = vec![chunk("s1", 0)];
        let new_embeddings: Vec<_> = new.iter().map(embedding).collect();
        store
            .replace_chunks("s1", &new, &new_embeddings)
            .await
            .unwrap();

        let chunks = store.chunks_for_source("s1").await.unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_membership_query_limit() {
        let store = MemoryStore::new();
        let ids: Vec<String> = (0..MAX_MEMBERSHIP_IDS + 1)
            .map(|i| format!("s{i}"))
            .collect();
        let result = store.chunk_ids_for_sources(&ids).await;
        assert!(matches!(result, Err(StoreError::TooManyIds(11))));
    }

    #[tokio::test]
    async fn test_cache_entry_upsert_replaces() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut entry = CacheEntry {
            subject_id: "p1".into(),
            cache_type: "sources".into(),
            provider_handle: "caches/a".into(),
            content_hash: "h1".into(),
            created_at: now,
            expires_at: now + Duration::seconds(60),
        };
        store.upsert_cache_entry(&entry).await.unwrap();
        entry.provider_handle = "caches/b".into();
        store.upsert_cache_entry(&entry).await.unwrap();

        let fetched = store.get_cache_entry("p1", "sources").await.unwrap().unwrap();
        assert_eq!(fetched.provider_handle, "caches/b");
    }

    #[tokio::test]
    async fn test_take_expired_cache_entries() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let live = CacheEntry {
            subject_id: "p1".into(),
            cache_type: "sources".into(),
            provider_handle: "caches/live".into(),
            content_hash: "h".into(),
            created_at: now,
            expires_at: now + Duration::seconds(600),
        };
        let dead = CacheEntry {
            subject_id: "p2".into(),
            cache_type: "sources".into(),
            provider_handle: "caches/dead".into(),
            content_hash: "h".into(),
            created_at: now - Duration::seconds(700),
            expires_at: now - Duration::seconds(100),
        };
        store.upsert_cache_entry(&live).await.unwrap();
        store.upsert_cache_entry(&dead).await.unwrap();

        let expired = store.take_expired_cache_entries(now).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].provider_handle, "caches/dead");
        assert!(store.get_cache_entry("p1", "sources").await.unwrap().is_some());
        assert!(store.get_cache_entry("p2", "sources").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unresolved_difficulties_severity_order() {
        let store = MemoryStore::new();
        let mut mild = DifficultyTopic::new("u1", "p1", "osmosis");
        let mut severe = DifficultyTopic::new("u1", "p1", "glycolysis");
        severe.register_miss();
        severe.register_miss();
        mild.level = 1;
        let mut resolved = DifficultyTopic::new("u1", "p1", "mitosis");
        resolved.resolve();

        store.put_difficulty(&mild).await.unwrap();
        store.put_difficulty(&severe).await.unwrap();
        store.put_difficulty(&resolved).await.unwrap();

        let unresolved = store.unresolved_difficulties("u1", "p1", 5).await.unwrap();
        assert_eq!(unresolved.len(), 2);
        assert_eq!(unresolved[0].topic, "glycolysis");
    }
}
