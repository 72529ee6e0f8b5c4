//! Language Model Provider boundary.
//!
//! The pipeline is vendor-agnostic: everything above this module talks to
//! [`LanguageModelProvider`], and the concrete wire format lives entirely
//! in [`HttpProvider`].

mod http;

pub use http::HttpProvider;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::ProviderError;
use crate::models::TokenUsage;

/// A single text or JSON-mode completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    pub model: &'a str,
    pub max_output_tokens: u32,
    /// Ask the provider for a structured JSON response.
    pub json_mode: bool,
    /// Server-side cached prompt prefix to prepend, if any.
    pub cache_handle: Option<&'a str>,
}

/// Completion text plus reported token usage.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Handle to a provider-side context cache.
#[derive(Debug, Clone)]
pub struct ProviderCache {
    pub handle: String,
    pub expires_at: DateTime<Utc>,
}

/// External language-model capability: completion, embedding, and
/// TTL-bounded prompt caching.
#[async_trait]
pub trait LanguageModelProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, ProviderError>;

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>, ProviderError>;

    async fn create_cache(
        &self,
        content: &str,
        model: &str,
        ttl: Duration,
    ) -> Result<ProviderCache, ProviderError>;

    /// A handle can be valid in the store but already evicted provider-side.
    async fn cache_exists(&self, handle: &str) -> Result<bool, ProviderError>;

    async fn delete_cache(&self, handle: &str) -> Result<(), ProviderError>;
}
