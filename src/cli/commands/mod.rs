mod cache;
mod config;
mod difficulties;
mod generate;
mod ingest;
mod search;
mod status;

pub use cache::CacheCommand;
pub use config::ConfigCommand;
pub use difficulties::DifficultiesCommand;
pub use generate::GenerateCommand;
pub use ingest::IngestArgs;
pub use search::SearchArgs;

pub use cache::handle_cache;
pub use config::handle_config;
pub use difficulties::handle_difficulties;
pub use generate::handle_generate;
pub use ingest::handle_ingest;
pub use search::handle_search;
pub use status::handle_status;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::models::Config;
use crate::provider::{HttpProvider, LanguageModelProvider};
use crate::services::{
    ContextCacheManager, EmbeddingService, GenerationOrchestrator, IngestService,
    SemanticRetriever,
};
use crate::store::{DocumentStore, SqliteStore};

/// Shared wiring for command handlers: one provider, one store, and the
/// services built on top of them. Explicitly constructed per invocation,
/// with no ambient globals.
pub(crate) struct Pipeline {
    pub config: Config,
    pub provider: Arc<dyn LanguageModelProvider>,
    pub store: Arc<dyn DocumentStore>,
    pub embedding: Arc<EmbeddingService>,
}

impl Pipeline {
    pub fn from_config(config: Config) -> Result<Self> {
        let provider: Arc<dyn LanguageModelProvider> = Arc::new(
            HttpProvider::new(&config.provider).context("failed to create provider client")?,
        );

        let store_path = config
            .store
            .resolve_path()
            .context("could not determine store path")?;
        let store: Arc<dyn DocumentStore> = Arc::new(
            SqliteStore::open(&store_path)
                .with_context(|| format!("failed to open store at {}", store_path.display()))?,
        );

        let embedding = Arc::new(EmbeddingService::new(provider.clone(), &config.embedding));

        Ok(Self {
            config,
            provider,
            store,
            embedding,
        })
    }

    pub fn load() -> Result<Self> {
        let config = Config::load().context("failed to load configuration")?;
        Self::from_config(config)
    }

    pub fn retriever(&self) -> SemanticRetriever {
        SemanticRetriever::new(
            self.embedding.clone(),
            self.store.clone(),
            self.config.retrieval.similarity_threshold,
        )
    }

    pub fn retriever_with_threshold(&self, threshold: f32) -> SemanticRetriever {
        SemanticRetriever::new(self.embedding.clone(), self.store.clone(), threshold)
    }

    pub fn orchestrator(&self) -> GenerationOrchestrator {
        GenerationOrchestrator::new(self.provider.clone(), self.store.clone(), &self.config)
    }

    pub fn ingest_service(&self) -> Result<IngestService> {
        IngestService::new(
            &self.config.chunking,
            &self.config.provider,
            self.embedding.clone(),
            self.store.clone(),
        )
        .context("invalid chunking configuration")
    }

    pub fn cache_manager(&self) -> ContextCacheManager {
        ContextCacheManager::new(
            self.provider.clone(),
            self.store.clone(),
            std::time::Duration::from_secs(self.config.cache.ttl_secs),
        )
    }
}

/// Parse a comma-separated source id list.
pub(crate) fn parse_source_ids(raw: &str) -> Result<Vec<String>> {
    let ids: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        anyhow::bail!("at least one source id is required");
    }
    Ok(ids)
}
