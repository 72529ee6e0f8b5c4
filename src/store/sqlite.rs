//! SQLite-backed [`DocumentStore`] used by the CLI.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params, params_from_iter};

use crate::error::StoreError;
use crate::models::{CacheEntry, Chunk, ChunkEmbedding, DifficultyTopic};

use super::{DocumentStore, check_membership_len};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    content TEXT NOT NULL,
    token_count INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id);

CREATE TABLE IF NOT EXISTS embeddings (
    chunk_id TEXT PRIMARY KEY REFERENCES chunks(id) ON DELETE CASCADE,
    model TEXT NOT NULL,
    vector BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS cache_entries (
    subject_id TEXT NOT NULL,
    cache_type TEXT NOT NULL,
    provider_handle TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    PRIMARY KEY (subject_id, cache_type)
);

CREATE TABLE IF NOT EXISTS difficulties (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    topic TEXT NOT NULL,
    level INTEGER NOT NULL,
    resolved INTEGER NOT NULL,
    consecutive_correct INTEGER NOT NULL,
    UNIQUE (user_id, project_id, topic)
);
"#;

/// Durable store for the CLI, one connection behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Other(format!("cannot create store directory: {e}")))?;
        }
        let conn = Connection::open(path)?;
        Self::initialize(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect()
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Other(format!("invalid stored timestamp {raw:?}: {e}")))
}

fn placeholders(count: usize) -> String {
    let mut s = String::new();
    for i in 1..=count {
        if i > 1 {
            s.push(',');
        }
        s.push('?');
        s.push_str(&i.to_string());
    }
    s
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
    Ok(Chunk {
        id: row.get(0)?,
        source_id: row.get(1)?,
        index: row.get::<_, i64>(2)? as u32,
        content: row.get(3)?,
        token_count: row.get::<_, i64>(4)? as u32,
    })
}

fn row_to_difficulty(row: &rusqlite::Row<'_>) -> rusqlite::Result<DifficultyTopic> {
    Ok(DifficultyTopic {
        id: row.get(0)?,
        user_id: row.get(1)?,
        project_id: row.get(2)?,
        topic: row.get(3)?,
        level: row.get::<_, i64>(4)? as u32,
        resolved: row.get::<_, i64>(5)? != 0,
        consecutive_correct: row.get::<_, i64>(6)? as u32,
    })
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn replace_chunks(
        &self,
        source_id: &str,
        chunks: &[Chunk],
        embeddings: &[ChunkEmbedding],
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM chunks WHERE source_id = ?1", params![source_id])?;
        for chunk in chunks {
            tx.execute(
                "INSERT INTO chunks (id, source_id, chunk_index, content, token_count)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    chunk.id,
                    chunk.source_id,
                    chunk.index as i64,
                    chunk.content,
                    chunk.token_count as i64
                ],
            )?;
        }
        for embedding in embeddings {
            tx.execute(
                "INSERT OR REPLACE INTO embeddings (chunk_id, model, vector)
                 VALUES (?1, ?2, ?3)",
                params![
                    embedding.chunk_id,
                    embedding.model,
                    vector_to_blob(&embedding.vector)
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn delete_source(&self, source_id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM chunks WHERE source_id = ?1", params![source_id])?;
        Ok(())
    }

    async fn chunk_ids_for_sources(&self, source_ids: &[String]) -> Result<Vec<String>, StoreError> {
        check_membership_len(source_ids)?;
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT id FROM chunks WHERE source_id IN ({}) ORDER BY source_id, chunk_index",
            placeholders(source_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(source_ids), |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    async fn chunks_for_source(&self, source_id: &str) -> Result<Vec<Chunk>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, source_id, chunk_index, content, token_count
             FROM chunks WHERE source_id = ?1 ORDER BY chunk_index",
        )?;
        let chunks = stmt
            .query_map(params![source_id], row_to_chunk)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(chunks)
    }

    async fn chunks_with_embeddings(
        &self,
        chunk_ids: &[String],
    ) -> Result<Vec<(Chunk, ChunkEmbedding)>, StoreError> {
        check_membership_len(chunk_ids)?;
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT c.id, c.source_id, c.chunk_index, c.content, c.token_count, e.model, e.vector
             FROM chunks c JOIN embeddings e ON e.chunk_id = c.id
             WHERE c.id IN ({})",
            placeholders(chunk_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let pairs = stmt
            .query_map(params_from_iter(chunk_ids), |row| {
                let chunk = row_to_chunk(row)?;
                let embedding = ChunkEmbedding {
                    chunk_id: chunk.id.clone(),
                    model: row.get(5)?,
                    vector: blob_to_vector(&row.get::<_, Vec<u8>>(6)?),
                };
                Ok((chunk, embedding))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pairs)
    }

    async fn has_embeddings(&self, source_ids: &[String]) -> Result<bool, StoreError> {
        check_membership_len(source_ids)?;
        if source_ids.is_empty() {
            return Ok(false);
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT 1 FROM chunks c JOIN embeddings e ON e.chunk_id = c.id
             WHERE c.source_id IN ({}) LIMIT 1",
            placeholders(source_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let found = stmt.exists(params_from_iter(source_ids))?;
        Ok(found)
    }

    async fn get_cache_entry(
        &self,
        subject_id: &str,
        cache_type: &str,
    ) -> Result<Option<CacheEntry>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT subject_id, cache_type, provider_handle, content_hash, created_at, expires_at
             FROM cache_entries WHERE subject_id = ?1 AND cache_type = ?2",
        )?;
        let mut rows = stmt.query_map(params![subject_id, cache_type], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        match rows.next().transpose()? {
            None => Ok(None),
            Some((subject_id, cache_type, provider_handle, content_hash, created, expires)) => {
                Ok(Some(CacheEntry {
                    subject_id,
                    cache_type,
                    provider_handle,
                    content_hash,
                    created_at: parse_timestamp(&created)?,
                    expires_at: parse_timestamp(&expires)?,
                }))
            }
        }
    }

    async fn upsert_cache_entry(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO cache_entries
                 (subject_id, cache_type, provider_handle, content_hash, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (subject_id, cache_type) DO UPDATE SET
                 provider_handle = excluded.provider_handle,
                 content_hash = excluded.content_hash,
                 created_at = excluded.created_at,
                 expires_at = excluded.expires_at",
            params![
                entry.subject_id,
                entry.cache_type,
                entry.provider_handle,
                entry.content_hash,
                entry.created_at.to_rfc3339(),
                entry.expires_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    async fn delete_cache_entry(
        &self,
        subject_id: &str,
        cache_type: &str,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM cache_entries WHERE subject_id = ?1 AND cache_type = ?2",
            params![subject_id, cache_type],
        )?;
        Ok(())
    }

    async fn take_expired_cache_entries(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CacheEntry>, StoreError> {
        let now_str = now.to_rfc3339();
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let expired = {
            let mut stmt = tx.prepare(
                "SELECT subject_id, cache_type, provider_handle, content_hash, created_at, expires_at
                 FROM cache_entries WHERE expires_at <= ?1",
            )?;
            let rows = stmt
                .query_map(params![now_str], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter()
                .map(
                    |(subject_id, cache_type, provider_handle, content_hash, created, expires)| {
                        Ok(CacheEntry {
                            subject_id,
                            cache_type,
                            provider_handle,
                            content_hash,
                            created_at: parse_timestamp(&created)?,
                            expires_at: parse_timestamp(&expires)?,
                        })
                    },
                )
                .collect::<Result<Vec<_>, StoreError>>()?
        };
        tx.execute("DELETE FROM cache_entries WHERE expires_at <= ?1", params![now_str])?;
        tx.commit()?;
        Ok(expired)
    }

    async fn unresolved_difficulties(
        &self,
        user_id: &str,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<DifficultyTopic>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, project_id, topic, level, resolved, consecutive_correct
             FROM difficulties
             WHERE user_id = ?1 AND project_id = ?2 AND resolved = 0
             ORDER BY level DESC LIMIT ?3",
        )?;
        let topics = stmt
            .query_map(params![user_id, project_id, limit as i64], row_to_difficulty)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(topics)
    }

    async fn find_difficulty(
        &self,
        user_id: &str,
        project_id: &str,
        topic: &str,
    ) -> Result<Option<DifficultyTopic>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, project_id, topic, level, resolved, consecutive_correct
             FROM difficulties
             WHERE user_id = ?1 AND project_id = ?2 AND topic = ?3 COLLATE NOCASE",
        )?;
        let mut rows = stmt.query_map(params![user_id, project_id, topic], row_to_difficulty)?;
        Ok(rows.next().transpose()?)
    }

    async fn put_difficulty(&self, difficulty: &DifficultyTopic) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO difficulties
                 (id, user_id, project_id, topic, level, resolved, consecutive_correct)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (id) DO UPDATE SET
                 topic = excluded.topic,
                 level = excluded.level,
                 resolved = excluded.resolved,
                 consecutive_correct = excluded.consecutive_correct",
            params![
                difficulty.id,
                difficulty.user_id,
                difficulty.project_id,
                difficulty.topic,
                difficulty.level as i64,
                difficulty.resolved as i64,
                difficulty.consecutive_correct as i64
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_blob_round_trip() {
        let vector = vec![0.5f32, -1.25, 3.0];
        assert_eq!(blob_to_vector(&vector_to_blob(&vector)), vector);
        assert!(blob_to_vector(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("studygen.db");
        let store = SqliteStore::open(&path).unwrap();

        let chunks = vec![Chunk::new("s1", 0, "persisted".to_string())];
        store.replace_chunks("s1", &chunks, &[]).await.unwrap();
        drop(store);

        // Reopening sees the persisted rows
        let reopened = SqliteStore::open(&path).unwrap();
        let loaded = reopened.chunks_for_source("s1").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content, "persisted");
    }

    #[tokio::test]
    async fn test_chunks_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let chunks = vec![
            Chunk::new("s1", 0, "first paragraph".to_string()),
            Chunk::new("s1", 1, "second paragraph".to_string()),
        ];
        let embeddings: Vec<ChunkEmbedding> = chunks
            .iter()
            .map(|c| ChunkEmbedding {
                chunk_id: c.id.clone(),
                model: "embed-001".to_string(),
                vector: vec![0.1, 0.2, 0.3],
            })
            .collect();
        store.replace_chunks("s1", &chunks, &embeddings).await.unwrap();

        let loaded = store.chunks_for_source("s1").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].index, 0);
        assert_eq!(loaded[1].content, "second paragraph");

        let ids = store
            .chunk_ids_for_sources(&["s1".to_string()])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let pairs = store.chunks_with_embeddings(&ids).await.unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].1.vector, vec![0.1, 0.2, 0.3]);

        assert!(store.has_embeddings(&["s1".to_string()]).await.unwrap());
        assert!(!store.has_embeddings(&["s2".to_string()]).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_source_cascades_embeddings() {
        let store = SqliteStore::open_in_memory().unwrap();
        let chunks = vec![Chunk::new("s1", 0, "text".to_string())];
        let embeddings = vec![ChunkEmbedding {
            chunk_id: chunks[0].id.clone(),
            model: "embed-001".to_string(),
            vector: vec![1.0],
        }];
        store.replace_chunks("s1", &chunks, &embeddings).await.unwrap();
        store.delete_source("s1").await.unwrap();

        assert!(store.chunks_for_source("s1").await.unwrap().is_empty());
        assert!(!store.has_embeddings(&["s1".to_string()]).await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_entry_lifecycle() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        let entry = CacheEntry {
            subject_id: "p1".into(),
            cache_type: "sources".into(),
            provider_handle: "caches/a".into(),
            content_hash: "h1".into(),
            created_at: now,
            expires_at: now - chrono::Duration::seconds(1),
        };
        store.upsert_cache_entry(&entry).await.unwrap();

        let expired = store.take_expired_cache_entries(now).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert!(store.get_cache_entry("p1", "sources").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_difficulty_upsert_and_query() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut topic = DifficultyTopic::new("u1", "p1", "Osmosis");
        store.put_difficulty(&topic).await.unwrap();

        let found = store.find_difficulty("u1", "p1", "osmosis").await.unwrap();
        assert!(found.is_some());

        topic.register_miss();
        store.put_difficulty(&topic).await.unwrap();
        let unresolved = store.unresolved_difficulties("u1", "p1", 5).await.unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].level, 2);
    }
}
