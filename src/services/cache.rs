//! Context cache management.
//!
//! Keeps at most one provider-side cached prompt prefix per
//! `(subject_id, cache_type)` pair so repeated batches and follow-up
//! requests stop re-paying for the same context. Cache reuse is an
//! optimization only: every operation here degrades to `None` on failure
//! and callers fall back to inlining the context.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::models::CacheEntry;
use crate::provider::LanguageModelProvider;
use crate::store::DocumentStore;
use crate::utils::calculate_checksum;

pub struct ContextCacheManager {
    provider: Arc<dyn LanguageModelProvider>,
    store: Arc<dyn DocumentStore>,
    ttl: Duration,
}

impl ContextCacheManager {
    pub fn new(
        provider: Arc<dyn LanguageModelProvider>,
        store: Arc<dyn DocumentStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            ttl,
        }
    }

    /// Return a live cache handle for the content, reusing an existing
    /// provider cache when possible.
    ///
    /// The check-then-create sequence is not transactionally atomic: two
    /// concurrent requests may both create a provider cache. The store's
    /// upsert picks the winner and the loser's cache expires via TTL.
    pub async fn get_or_create(
        &self,
        subject_id: &str,
        cache_type: &str,
        content: &str,
        model: &str,
    ) -> Option<String> {
        let content_hash = calculate_checksum(content);

        let existing = match self.store.get_cache_entry(subject_id, cache_type).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(subject_id, cache_type, error = %e, "cache lookup failed");
                return None;
            }
        };

        if let Some(entry) = existing {
            if let Some(handle) = self.try_reuse(&entry, &content_hash).await {
                return Some(handle);
            }
        }

        self.create(subject_id, cache_type, content, model, content_hash)
            .await
    }

    /// Reuse a stored entry if it is unexpired, hash-matching, and still
    /// alive provider-side; otherwise clean it up and return `None`.
    async fn try_reuse(&self, entry: &CacheEntry, content_hash: &str) -> Option<String> {
        let now = Utc::now();

        if entry.is_expired(now) {
            debug!(handle = %entry.provider_handle, "stored cache expired");
            self.remove_entry(entry, false).await;
            return None;
        }

        if entry.content_hash != content_hash {
            debug!(handle = %entry.provider_handle, "cache content changed");
            self.remove_entry(entry, true).await;
            return None;
        }

        // The handle can be valid in the store but already evicted
        // provider-side
        match self.provider.cache_exists(&entry.provider_handle).await {
            Ok(true) => {
                debug!(handle = %entry.provider_handle, "reusing context cache");
                Some(entry.provider_handle.clone())
            }
            Ok(false) => {
                warn!(handle = %entry.provider_handle, "cache evicted provider-side");
                self.remove_entry(entry, false).await;
                None
            }
            Err(e) => {
                warn!(handle = %entry.provider_handle, error = %e, "cache liveness check failed");
                self.remove_entry(entry, false).await;
                None
            }
        }
    }

    async fn create(
        &self,
        subject_id: &str,
        cache_type: &str,
        content: &str,
        model: &str,
        content_hash: String,
    ) -> Option<String> {
        let created = match self.provider.create_cache(content, model, self.ttl).await {
            Ok(cache) => cache,
            Err(e) => {
                warn!(subject_id, cache_type, error = %e, "cache creation failed");
                return None;
            }
        };

        debug!(handle = %created.handle, subject_id, cache_type, "context cache created");

        let entry = CacheEntry {
            subject_id: subject_id.to_string(),
            cache_type: cache_type.to_string(),
            provider_handle: created.handle.clone(),
            content_hash,
            created_at: Utc::now(),
            expires_at: created.expires_at,
        };

        // The provider cache is usable even if persisting the mapping fails
        if let Err(e) = self.store.upsert_cache_entry(&entry).await {
            warn!(subject_id, cache_type, error = %e, "failed to persist cache mapping");
        }

        Some(created.handle)
    }

    /// Explicitly drop the cache for a subject, provider-side and store-side.
    /// Used when the underlying content changes.
    pub async fn invalidate(&self, subject_id: &str, cache_type: &str) {
        let entry = match self.store.get_cache_entry(subject_id, cache_type).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return,
            Err(e) => {
                warn!(subject_id, cache_type, error = %e, "cache lookup failed during invalidation");
                return;
            }
        };

        self.remove_entry(&entry, true).await;
    }

    /// Remove expired store rows, independent of any lookup, so storage
    /// growth stays bounded. Returns the number of rows removed.
    pub async fn sweep_expired(&self) -> usize {
        let expired = match self.store.take_expired_cache_entries(Utc::now()).await {
            Ok(expired) => expired,
            Err(e) => {
                warn!(error = %e, "cache sweep failed");
                return 0;
            }
        };

        for entry in &expired {
            if let Err(e) = self.provider.delete_cache(&entry.provider_handle).await {
                warn!(handle = %entry.provider_handle, error = %e, "provider cache delete failed");
            }
        }

        if !expired.is_empty() {
            debug!(count = expired.len(), "swept expired cache entries");
        }
        expired.len()
    }

    async fn remove_entry(&self, entry: &CacheEntry, delete_provider_side: bool) {
        if delete_provider_side
            && let Err(e) = self.provider.delete_cache(&entry.provider_handle).await
        {
            warn!(handle = %entry.provider_handle, error = %e, "provider cache delete failed");
        }

        if let Err(e) = self
            .store
            .delete_cache_entry(&entry.subject_id, &entry.cache_type)
            .await
        {
            warn!(
                subject_id = %entry.subject_id,
                cache_type = %entry.cache_type,
                error = %e,
                "cache row delete failed"
            );
        }
    }
}
