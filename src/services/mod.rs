mod cache;
mod chunker;
mod context;
mod embedding;
mod ingest;
mod orchestrator;
mod planner;
mod recovery;
mod retrieval;

pub use cache::ContextCacheManager;
pub use chunker::TextChunker;
pub use context::{assemble_fallback_context, format_retrieved_context};
pub use embedding::EmbeddingService;
pub use ingest::{IngestReport, IngestService};
pub use orchestrator::GenerationOrchestrator;
pub use planner::{BatchPlan, SummaryStrategy, TokenBudgetPlanner};
pub use recovery::{RecoveryStrategy, StrategyKind, select_strategy};
pub use retrieval::{SemanticRetriever, cosine_similarity};
