use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-side record of a provider context cache.
///
/// At most one live entry exists per `(subject_id, cache_type)` pair; the
/// store enforces this with upsert-on-conflict semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub subject_id: String,
    pub cache_type: String,
    pub provider_handle: String,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
