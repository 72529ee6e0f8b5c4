//! HTTP client for the model provider API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ProviderError;
use crate::models::{ProviderConfig, TokenUsage};

use super::{Completion, CompletionRequest, LanguageModelProvider, ProviderCache};

#[derive(Debug, Serialize)]
struct CompleteBody<'a> {
    model: &'a str,
    prompt: &'a str,
    max_output_tokens: u32,
    json_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_handle: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CompleteResponse {
    text: String,
    #[serde(default)]
    usage: UsageBody,
}

#[derive(Debug, Default, Deserialize)]
struct UsageBody {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cached_tokens: u64,
}

impl From<UsageBody> for TokenUsage {
    fn from(body: UsageBody) -> Self {
        TokenUsage {
            input_tokens: body.input_tokens,
            output_tokens: body.output_tokens,
            cached_tokens: body.cached_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedBody<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct CreateCacheBody<'a> {
    model: &'a str,
    content: &'a str,
    ttl_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct CreateCacheResponse {
    handle: String,
    expires_at: DateTime<Utc>,
}

/// Client for a generic model-provider REST API.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.resolve_api_key(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    /// Map non-success statuses onto the provider error taxonomy.
    ///
    /// A 404 from a model endpoint means the model does not exist; the
    /// orchestrator uses that to trigger its single fallback-model retry.
    async fn classify_error(
        response: reqwest::Response,
        model: Option<&str>,
    ) -> ProviderError {
        let status = response.status();
        let message = response.text().await.unwrap_or_default();

        match status {
            StatusCode::NOT_FOUND if model.is_some() => {
                ProviderError::ModelNotFound(model.unwrap_or_default().to_string())
            }
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
            _ => ProviderError::Api {
                status: status.as_u16(),
                message,
            },
        }
    }

    fn map_send_error(error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Request(error)
        }
    }
}

#[async_trait]
impl LanguageModelProvider for HttpProvider {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, ProviderError> {
        let body = CompleteBody {
            model: request.model,
            prompt: request.prompt,
            max_output_tokens: request.max_output_tokens,
            json_mode: request.json_mode,
            cache_handle: request.cache_handle,
        };

        let response = self
            .request(reqwest::Method::POST, "/v1/complete")
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_error(response, Some(request.model)).await);
        }

        let parsed: CompleteResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if parsed.text.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "completion contained no text".to_string(),
            ));
        }

        Ok(Completion {
            text: parsed.text,
            usage: parsed.usage.into(),
        })
    }

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>, ProviderError> {
        let body = EmbedBody { model, input: text };

        let response = self
            .request(reqwest::Method::POST, "/v1/embed")
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_error(response, Some(model)).await);
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if parsed.embedding.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "empty embedding vector".to_string(),
            ));
        }

        Ok(parsed.embedding)
    }

    async fn create_cache(
        &self,
        content: &str,
        model: &str,
        ttl: Duration,
    ) -> Result<ProviderCache, ProviderError> {
        let body = CreateCacheBody {
            model,
            content,
            ttl_seconds: ttl.as_secs(),
        };

        let response = self
            .request(reqwest::Method::POST, "/v1/caches")
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_error(response, Some(model)).await);
        }

        let parsed: CreateCacheResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(ProviderCache {
            handle: parsed.handle,
            expires_at: parsed.expires_at,
        })
    }

    async fn cache_exists(&self, handle: &str) -> Result<bool, ProviderError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/v1/caches/{handle}"))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(Self::classify_error(response, None).await),
        }
    }

    async fn delete_cache(&self, handle: &str) -> Result<(), ProviderError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/v1/caches/{handle}"))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        // Deleting an already-expired cache is not an error
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        Err(Self::classify_error(response, None).await)
    }
}
