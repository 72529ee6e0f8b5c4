mod cache;
mod chunk;
mod config;
mod difficulty;
mod request;

pub use cache::CacheEntry;
pub use chunk::{Chunk, ChunkEmbedding, RetrievalResult};
pub use config::{
    API_KEY_ENV, CacheConfig, ChunkingConfig, Config, DEFAULT_PROVIDER_URL, EmbeddingConfig,
    LimitsConfig, ProviderConfig, RetrievalConfig, StoreConfig,
};
pub use difficulty::{
    AUTO_RESOLVE_THRESHOLD, AnswerOutcome, DifficultyTopic, MAX_RECOVERY_TOPICS,
};
pub use request::{
    GeneratedItem, ItemKind, ItemOutput, ItemRequest, SummaryOutput, SummaryRequest, TokenUsage,
};
