use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_PROVIDER_URL: &str = "http://localhost:11434";
pub const API_KEY_ENV: &str = "STUDYGEN_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("studygen").join("config.toml"))
    }

    pub fn load() -> Result<Self, crate::error::ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            return Ok(config);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> Result<(), crate::error::ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            crate::error::ConfigError::Path("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_url")]
    pub base_url: String,

    /// API key; falls back to the `STUDYGEN_API_KEY` environment variable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_fallback_embedding_model")]
    pub fallback_embedding_model: String,
}

fn default_provider_url() -> String {
    DEFAULT_PROVIDER_URL.to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_model() -> String {
    "generate-standard".to_string()
}

fn default_fallback_model() -> String {
    "generate-lite".to_string()
}

fn default_embedding_model() -> String {
    "embed-001".to_string()
}

fn default_fallback_embedding_model() -> String {
    "embed-lite".to_string()
}

impl ProviderConfig {
    /// Resolve the API key from config or environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_url(),
            api_key: None,
            timeout_secs: default_timeout(),
            model: default_model(),
            fallback_model: default_fallback_model(),
            embedding_model: default_embedding_model(),
            fallback_embedding_model: default_fallback_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in estimated tokens.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Overlap target in estimated tokens (context preservation, not a
    /// byte guarantee).
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_chunk_size() -> u32 {
    800
}

fn default_chunk_overlap() -> u32 {
    100
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_file_size: default_max_file_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Chunks embedded per provider sub-batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delay between sub-batches, to respect provider rate limits.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_delay_ms() -> u64 {
    500
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Default token budget for retrieved context.
    #[serde(default = "default_token_budget")]
    pub token_budget: u32,
}

fn default_similarity_threshold() -> f32 {
    0.5
}

fn default_token_budget() -> u32 {
    12_000
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            token_budget: default_token_budget(),
        }
    }
}

/// Token ceilings for generation planning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Safe per-request output ceiling (below the provider's hard cap).
    #[serde(default = "default_safe_output_limit")]
    pub safe_output_limit: u32,

    /// Provider's combined input+output context limit.
    #[serde(default = "default_context_limit")]
    pub context_limit: u32,

    #[serde(default = "default_safety_margin")]
    pub safety_margin: u32,

    /// Hard cap on output tokens the provider can generate.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Minimum output worth generating at all.
    #[serde(default = "default_min_output_tokens")]
    pub min_output_tokens: u32,

    /// Characters per summary section in the sectioned strategy.
    #[serde(default = "default_section_chars")]
    pub section_chars: usize,

    /// Inputs above this size always use the sectioned summary strategy.
    #[serde(default = "default_single_summary_max_chars")]
    pub single_summary_max_chars: usize,

    /// Desired output for summaries before safety clamping.
    #[serde(default = "default_desired_summary_tokens")]
    pub desired_summary_tokens: u32,

    /// A single-shot summary must be allowed at least this much output,
    /// otherwise the sectioned strategy is used.
    #[serde(default = "default_min_single_summary_tokens")]
    pub min_single_summary_tokens: u32,

    /// Char cap when inlining fallback context into a prompt.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

fn default_safe_output_limit() -> u32 {
    12_000
}

fn default_context_limit() -> u32 {
    30_000
}

fn default_safety_margin() -> u32 {
    2_000
}

fn default_max_output_tokens() -> u32 {
    16_384
}

fn default_min_output_tokens() -> u32 {
    4_000
}

fn default_section_chars() -> usize {
    50_000
}

fn default_single_summary_max_chars() -> usize {
    300_000
}

fn default_desired_summary_tokens() -> u32 {
    14_000
}

fn default_min_single_summary_tokens() -> u32 {
    6_000
}

fn default_max_context_chars() -> usize {
    30_000
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            safe_output_limit: default_safe_output_limit(),
            context_limit: default_context_limit(),
            safety_margin: default_safety_margin(),
            max_output_tokens: default_max_output_tokens(),
            min_output_tokens: default_min_output_tokens(),
            section_chars: default_section_chars(),
            single_summary_max_chars: default_single_summary_max_chars(),
            desired_summary_tokens: default_desired_summary_tokens(),
            min_single_summary_tokens: default_min_single_summary_tokens(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

fn default_cache_ttl() -> u64 {
    1_800
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Path to the sqlite database; defaults under the user data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn resolve_path(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join("studygen").join("studygen.db")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.provider.base_url, DEFAULT_PROVIDER_URL);
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.embedding.batch_size, 10);
        assert_eq!(config.retrieval.similarity_threshold, 0.5);
        assert_eq!(config.limits.safe_output_limit, 12_000);
        assert_eq!(config.cache.ttl_secs, 1_800);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [provider]
            model = "generate-pro"

            [retrieval]
            token_budget = 8000
            "#,
        )
        .unwrap();
        assert_eq!(config.provider.model, "generate-pro");
        assert_eq!(config.provider.fallback_model, "generate-lite");
        assert_eq!(config.retrieval.token_budget, 8000);
        assert_eq!(config.limits.context_limit, 30_000);
    }
}
