//! Generation orchestration: planning, caching, batched provider calls,
//! defensive parsing, and aggregation.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::error::{GenerationError, ProviderError};
use crate::models::{
    Config, GeneratedItem, ItemOutput, ItemRequest, SummaryOutput, SummaryRequest, TokenUsage,
};
use crate::provider::{Completion, CompletionRequest, LanguageModelProvider};
use crate::store::DocumentStore;
use crate::utils::{estimate_tokens, parse_json_response, truncate_chars};

use super::cache::ContextCacheManager;
use super::planner::{SummaryStrategy, TokenBudgetPlanner};

/// Cache type under which generation context is stored per subject.
const CONTEXT_CACHE_TYPE: &str = "context";

/// Drives a generation request end to end.
///
/// Flow per request: plan batches, resolve a context cache when more than
/// one batch will run, call the provider per batch, defensively parse the
/// structured output, and aggregate items plus token usage. Failure in
/// any phase fails the request, except cache failures (degraded to
/// inline context) and summary section failures (degraded to a
/// placeholder section).
pub struct GenerationOrchestrator {
    provider: Arc<dyn LanguageModelProvider>,
    planner: TokenBudgetPlanner,
    cache: ContextCacheManager,
    model: String,
    fallback_model: String,
    max_context_chars: usize,
}

impl GenerationOrchestrator {
    pub fn new(
        provider: Arc<dyn LanguageModelProvider>,
        store: Arc<dyn DocumentStore>,
        config: &Config,
    ) -> Self {
        let cache = ContextCacheManager::new(
            provider.clone(),
            store,
            std::time::Duration::from_secs(config.cache.ttl_secs),
        );
        Self {
            provider,
            planner: TokenBudgetPlanner::new(config.limits.clone()),
            cache,
            model: config.provider.model.clone(),
            fallback_model: config.provider.fallback_model.clone(),
            max_context_chars: config.limits.max_context_chars,
        }
    }

    pub fn planner(&self) -> &TokenBudgetPlanner {
        &self.planner
    }

    pub fn cache(&self) -> &ContextCacheManager {
        &self.cache
    }

    /// Generate a batch-planned set of discrete study items.
    ///
    /// Batches run strictly sequentially: later batches are instructed to
    /// diversify relative to earlier ones.
    pub async fn generate_items(
        &self,
        request: &ItemRequest,
    ) -> Result<ItemOutput, GenerationError> {
        let plan = self.planner.plan_batches(request.kind, request.count)?;
        debug!(
            kind = %request.kind,
            total = plan.total,
            batches = plan.batch_sizes.len(),
            "batch plan ready"
        );

        // A shared context cache only pays off across several batches
        let cache_handle = if plan.is_batched()
            && let Some(subject_id) = &request.subject_id
        {
            self.cache
                .get_or_create(subject_id, CONTEXT_CACHE_TYPE, &request.context, &self.model)
                .await
        } else {
            None
        };

        let mut items: Vec<GeneratedItem> = Vec::with_capacity(request.count as usize);
        let mut usage = TokenUsage::default();

        for (batch_index, &batch_size) in plan.batch_sizes.iter().enumerate() {
            let prompt = self.build_item_prompt(
                request,
                batch_size,
                batch_index,
                plan.batch_sizes.len(),
                cache_handle.is_none(),
            );

            let desired = batch_size * TokenBudgetPlanner::tokens_per_item(request.kind);
            let max_output = self
                .planner
                .safe_output_tokens(estimate_tokens(&prompt), desired);
            if max_output == 0 {
                return Err(GenerationError::ContextExhausted);
            }

            debug!(
                batch = batch_index + 1,
                total = plan.batch_sizes.len(),
                size = batch_size,
                max_output,
                cached = cache_handle.is_some(),
                "generating batch"
            );

            let completion = self
                .complete_with_fallback(&prompt, max_output, true, cache_handle.as_deref())
                .await?;
            usage += completion.usage;

            let mut batch_items = self.parse_items(&completion.text)?;
            if let Some(difficulty) = &request.difficulty {
                for item in &mut batch_items {
                    item.difficulty.get_or_insert_with(|| difficulty.clone());
                }
            }
            items.extend(batch_items);
        }

        // The request's context cache is left to expire via TTL; a
        // follow-up request inside the window may still reuse it
        Ok(ItemOutput {
            items,
            usage,
            batches: plan.batch_sizes.len() as u32,
        })
    }

    /// Generate free-form summary text, sectioning large inputs.
    pub async fn generate_summary(
        &self,
        request: &SummaryRequest,
    ) -> Result<SummaryOutput, GenerationError> {
        match self
            .planner
            .summary_strategy(&request.content, request.desired_output_tokens)
        {
            SummaryStrategy::Single { max_output_tokens } => {
                if max_output_tokens == 0 {
                    return Err(GenerationError::ContextExhausted);
                }
                let prompt = build_summary_prompt(&request.content);
                let completion = self
                    .complete_with_fallback(&prompt, max_output_tokens, false, None)
                    .await?;
                Ok(SummaryOutput {
                    text: completion.text,
                    usage: completion.usage,
                    sections: 1,
                })
            }
            SummaryStrategy::Sectioned {
                section_chars,
                max_output_tokens,
            } => {
                if max_output_tokens == 0 {
                    return Err(GenerationError::ContextExhausted);
                }
                self.generate_sectioned_summary(request, section_chars, max_output_tokens)
                    .await
            }
        }
    }

    /// Fan out over all sections concurrently, then consolidate.
    ///
    /// Total latency becomes the slowest section rather than the sum. A
    /// failed section degrades to a placeholder: losing one section is
    /// preferable to losing the whole summary.
    async fn generate_sectioned_summary(
        &self,
        request: &SummaryRequest,
        section_chars: usize,
        max_output_tokens: u32,
    ) -> Result<SummaryOutput, GenerationError> {
        let sections = split_sections(&request.content, section_chars);
        let section_count = sections.len();
        debug!(sections = section_count, "sectioned summary");

        let section_results = join_all(sections.iter().enumerate().map(|(i, section)| {
            let prompt = build_section_prompt(section, i + 1, section_count);
            async move {
                let desired = 6_000;
                let max_output = self
                    .planner
                    .safe_output_tokens(estimate_tokens(&prompt), desired);
                if max_output == 0 {
                    return None;
                }
                self.complete_with_fallback(&prompt, max_output, false, None)
                    .await
                    .ok()
            }
        }))
        .await;

        let mut usage = TokenUsage::default();
        let mut section_texts = Vec::with_capacity(section_count);
        for (i, result) in section_results.into_iter().enumerate() {
            match result {
                Some(completion) => {
                    usage += completion.usage;
                    section_texts.push(completion.text);
                }
                None => {
                    warn!(section = i + 1, "summary section failed, using placeholder");
                    section_texts.push(format!(
                        "[Section {} of {} is unavailable]",
                        i + 1,
                        section_count
                    ));
                }
            }
        }

        let combine_prompt = build_combine_prompt(&section_texts);
        let completion = self
            .complete_with_fallback(&combine_prompt, max_output_tokens, false, None)
            .await?;
        usage += completion.usage;

        Ok(SummaryOutput {
            text: completion.text,
            usage,
            sections: section_count as u32,
        })
    }

    /// Call the provider, retrying exactly once against the fallback
    /// model when the requested model does not exist. Any other provider
    /// error fails immediately; retry policy beyond that belongs to the
    /// caller.
    async fn complete_with_fallback(
        &self,
        prompt: &str,
        max_output_tokens: u32,
        json_mode: bool,
        cache_handle: Option<&str>,
    ) -> Result<Completion, GenerationError> {
        let request = CompletionRequest {
            prompt,
            model: &self.model,
            max_output_tokens,
            json_mode,
            cache_handle,
        };

        match self.provider.complete(request).await {
            Ok(completion) => Ok(completion),
            Err(ProviderError::ModelNotFound(model)) => {
                warn!(model = %model, fallback = %self.fallback_model, "model unavailable, retrying with fallback");
                let retry = CompletionRequest {
                    prompt,
                    model: &self.fallback_model,
                    max_output_tokens,
                    json_mode,
                    cache_handle,
                };
                Ok(self.provider.complete(retry).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse structured item output, surfacing only the text length on
    /// failure to keep logs bounded.
    fn parse_items(&self, text: &str) -> Result<Vec<GeneratedItem>, GenerationError> {
        let malformed = || {
            warn!(length = text.len(), "unparseable generation output");
            GenerationError::MalformedOutput { length: text.len() }
        };

        let value = parse_json_response(text).ok_or_else(malformed)?;
        let array = match value.get("items") {
            Some(items) => items.clone(),
            None if value.is_array() => value,
            None => return Err(malformed()),
        };

        serde_json::from_value::<Vec<GeneratedItem>>(array).map_err(|_| malformed())
    }

    fn build_item_prompt(
        &self,
        request: &ItemRequest,
        batch_size: u32,
        batch_index: usize,
        total_batches: usize,
        inline_context: bool,
    ) -> String {
        let mut prompt = String::from(
            "You are a university teacher creating study material from the learner's own sources.\n\n",
        );

        if let Some(instructions) = &request.instructions {
            prompt.push_str(instructions);
            prompt.push_str("\n\n");
        }

        if inline_context {
            prompt.push_str("SOURCE MATERIAL:\n");
            prompt.push_str(truncate_chars(&request.context, self.max_context_chars));
            prompt.push_str("\n\n");
        }

        prompt.push_str(&format!(
            "Generate {} {}.\n",
            batch_size,
            request.kind.describe()
        ));

        if total_batches > 1 && batch_index > 0 {
            prompt.push_str(&format!(
                "This is batch {} of {}. Earlier batches already covered other \
                 aspects of the material; produce items that are clearly \
                 different from what a previous batch would contain.\n",
                batch_index + 1,
                total_batches
            ));
        }

        if let Some(difficulty) = &request.difficulty {
            prompt.push_str(&format!("Target difficulty: {difficulty}.\n"));
        }

        prompt.push_str(
            "\nRespond with JSON only, in the form:\n\
             {\"items\": [{\"prompt\": \"...\", \"answer\": \"...\", \
             \"topic\": \"...\", \"difficulty\": \"...\"}]}\n\
             Ground every item in the source material and keep answers precise.",
        );

        prompt
    }
}

fn build_summary_prompt(content: &str) -> String {
    format!(
        "You are a subject expert writing a structured study summary.\n\n\
         SOURCE MATERIAL:\n{content}\n\n\
         Write a complete, well-structured summary in Markdown. Cover every \
         major topic in the material, integrate repeated topics into single \
         sections, and keep the structure scannable with headings and lists."
    )
}

fn build_section_prompt(section: &str, number: usize, total: usize) -> String {
    format!(
        "You are a subject expert summarizing part {number} of {total} of a \
         larger document.\n\n\
         SECTION CONTENT:\n{section}\n\n\
         Write a structured, detailed Markdown summary of this section only."
    )
}

fn build_combine_prompt(section_texts: &[String]) -> String {
    let joined = section_texts
        .iter()
        .enumerate()
        .map(|(i, text)| format!("=== SECTION {} ===\n{}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Combine the following section summaries into one coherent study \
         summary. Merge duplicate topics into single sections and keep a \
         consistent Markdown structure throughout.\n\n{joined}"
    )
}

/// Split text into sections of at most `section_chars` characters on char
/// boundaries.
fn split_sections(content: &str, section_chars: usize) -> Vec<&str> {
    let section_chars = section_chars.max(1);
    let mut sections = Vec::new();
    let mut rest = content;

    while !rest.is_empty() {
        let section = truncate_chars(rest, section_chars);
        sections.push(section);
        rest = &rest[section.len()..];
    }

    if sections.is_empty() {
        sections.push(content);
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::{ItemKind, LimitsConfig};
    use crate::provider::ProviderCache;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    struct RecordedCall {
        model: String,
        has_inline_context: bool,
        cache_handle: Option<String>,
    }

    type Responder = Box<dyn Fn(&str, &str) -> Result<String, ProviderError> + Send + Sync>;

    struct ScriptedProvider {
        responder: Responder,
        calls: Mutex<Vec<RecordedCall>>,
        cache_creates: Mutex<u32>,
    }

    impl ScriptedProvider {
        fn new(responder: Responder) -> Self {
            Self {
                responder,
                calls: Mutex::new(Vec::new()),
                cache_creates: Mutex::new(0),
            }
        }

        fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModelProvider for ScriptedProvider {
        async fn complete(
            &self,
            request: CompletionRequest<'_>,
        ) -> Result<Completion, ProviderError> {
            self.calls.lock().unwrap().push(RecordedCall {
                model: request.model.to_string(),
                has_inline_context: request.prompt.contains("SOURCE MATERIAL:"),
                cache_handle: request.cache_handle.map(str::to_string),
            });
            let text = (self.responder)(request.prompt, request.model)?;
            Ok(Completion {
                text,
                usage: TokenUsage {
                    input_tokens: 100,
                    output_tokens: 50,
                    cached_tokens: if request.cache_handle.is_some() { 80 } else { 0 },
                },
            })
        }

        async fn embed(&self, _text: &str, _model: &str) -> Result<Vec<f32>, ProviderError> {
            unimplemented!("not used in orchestrator tests")
        }

        async fn create_cache(
            &self,
            _content: &str,
            _model: &str,
            ttl: Duration,
        ) -> Result<ProviderCache, ProviderError> {
            *self.cache_creates.lock().unwrap() += 1;
            Ok(ProviderCache {
                handle: "caches/ctx".to_string(),
                expires_at: Utc::now() + chrono::Duration::from_std(ttl).unwrap(),
            })
        }

        async fn cache_exists(&self, _handle: &str) -> Result<bool, ProviderError> {
            Ok(true)
        }

        async fn delete_cache(&self, _handle: &str) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn items_json(count: usize) -> String {
        let items: Vec<String> = (0..count)
            .map(|i| {
                format!(
                    r#"{{"prompt": "Question {i}?", "answer": "Answer {i}", "topic": "topic"}}"#
                )
            })
            .collect();
        format!(r#"{{"items": [{}]}}"#, items.join(","))
    }

    fn orchestrator(
        provider: Arc<ScriptedProvider>,
        limits: LimitsConfig,
    ) -> GenerationOrchestrator {
        let config = Config {
            limits,
            ..Default::default()
        };
        GenerationOrchestrator::new(provider, Arc::new(MemoryStore::new()), &config)
    }

    fn item_request(count: u32) -> ItemRequest {
        ItemRequest {
            kind: ItemKind::Flashcard,
            count,
            difficulty: Some("medium".to_string()),
            subject_id: Some("project-1".to_string()),
            context: "The cell membrane regulates transport.".to_string(),
            instructions: None,
        }
    }

    #[tokio::test]
    async fn test_single_batch_generation() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, _| Ok(items_json(5)))));
        let orchestrator = orchestrator(provider.clone(), LimitsConfig::default());

        let output = orchestrator
            .generate_items(&item_request(5))
            .await
            .unwrap();

        assert_eq!(output.items.len(), 5);
        assert_eq!(output.batches, 1);
        assert_eq!(output.usage.input_tokens, 100);
        // Single batch: no cache, context inlined
        assert_eq!(*provider.cache_creates.lock().unwrap(), 0);
        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].has_inline_context);
        assert!(calls[0].cache_handle.is_none());
        // Difficulty override fills missing fields
        assert!(output
            .items
            .iter()
            .all(|i| i.difficulty.as_deref() == Some("medium")));
    }

    #[tokio::test]
    async fn test_multi_batch_uses_cache_and_omits_context() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, _| Ok(items_json(4)))));
        let limits = LimitsConfig {
            safe_output_limit: 7_500, // 21 flashcards per batch
            ..Default::default()
        };
        let orchestrator = orchestrator(provider.clone(), limits);

        let output = orchestrator
            .generate_items(&item_request(25))
            .await
            .unwrap();

        assert_eq!(output.batches, 2);
        assert_eq!(output.items.len(), 8);
        assert_eq!(*provider.cache_creates.lock().unwrap(), 1);

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        for call in &calls {
            assert_eq!(call.cache_handle.as_deref(), Some("caches/ctx"));
            assert!(!call.has_inline_context);
        }
        // Cached input tokens are reported for billing
        assert_eq!(output.usage.cached_tokens, 160);
    }

    #[tokio::test]
    async fn test_model_not_found_retries_once_with_fallback() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, model| {
            if model == "generate-standard" {
                Err(ProviderError::ModelNotFound(model.to_string()))
            } else {
                Ok(items_json(3))
            }
        })));
        let orchestrator = orchestrator(provider.clone(), LimitsConfig::default());

        let output = orchestrator.generate_items(&item_request(3)).await.unwrap();
        assert_eq!(output.items.len(), 3);

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].model, "generate-standard");
        assert_eq!(calls[1].model, "generate-lite");
    }

    #[tokio::test]
    async fn test_other_provider_errors_fail_immediately() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, _| {
            Err(ProviderError::RateLimited)
        })));
        let orchestrator = orchestrator(provider.clone(), LimitsConfig::default());

        let result = orchestrator.generate_items(&item_request(3)).await;
        assert!(matches!(
            result,
            Err(GenerationError::Provider(ProviderError::RateLimited))
        ));
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_output_surfaced_with_length() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, _| {
            Ok("I cannot produce JSON today.".to_string())
        })));
        let orchestrator = orchestrator(provider, LimitsConfig::default());

        let result = orchestrator.generate_items(&item_request(3)).await;
        assert!(matches!(
            result,
            Err(GenerationError::MalformedOutput { length: 28 })
        ));
    }

    #[tokio::test]
    async fn test_fenced_output_is_recovered() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, _| {
            Ok(format!("```json\n{}\n```", items_json(2)))
        })));
        let orchestrator = orchestrator(provider, LimitsConfig::default());

        let output = orchestrator.generate_items(&item_request(2)).await.unwrap();
        assert_eq!(output.items.len(), 2);
    }

    #[tokio::test]
    async fn test_context_exhausted() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, _| Ok(items_json(1)))));
        let limits = LimitsConfig {
            context_limit: 5_000,
            ..Default::default()
        };
        let orchestrator = orchestrator(provider, limits);

        let mut request = item_request(1);
        // Inline context so large that no output fits the combined limit
        request.context = "x".repeat(20_000);
        let result = orchestrator.generate_items(&request).await;
        assert!(matches!(result, Err(GenerationError::ContextExhausted)));
    }

    #[tokio::test]
    async fn test_summary_single_strategy() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, _| {
            Ok("# Summary\ncontent".to_string())
        })));
        let orchestrator = orchestrator(provider.clone(), LimitsConfig::default());

        let output = orchestrator
            .generate_summary(&SummaryRequest {
                subject_id: None,
                content: "Short study notes about osmosis.".to_string(),
                desired_output_tokens: None,
            })
            .await
            .unwrap();

        assert_eq!(output.sections, 1);
        assert_eq!(output.text, "# Summary\ncontent");
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_sectioned_summary_degrades_failed_section() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|prompt, _| {
            if prompt.contains("BBB") {
                Err(ProviderError::Api {
                    status: 500,
                    message: "section backend failed".to_string(),
                })
            } else if prompt.contains("Combine the following") {
                Ok("combined summary".to_string())
            } else {
                Ok("section summary".to_string())
            }
        })));
        let limits = LimitsConfig {
            single_summary_max_chars: 1_000,
            section_chars: 500,
            ..Default::default()
        };
        let orchestrator = orchestrator(provider.clone(), limits);

        let content = format!("{}{}{}", "A".repeat(500), "B".repeat(500), "C".repeat(500));
        let output = orchestrator
            .generate_summary(&SummaryRequest {
                subject_id: None,
                content,
                desired_output_tokens: None,
            })
            .await
            .unwrap();

        assert_eq!(output.sections, 3);
        assert_eq!(output.text, "combined summary");
        // 4 calls: three sections (one failed) plus the combine call
        assert_eq!(provider.calls().len(), 4);
        // Usage counted only for successful calls: 2 sections + combine
        assert_eq!(output.usage.output_tokens, 150);
    }

    #[test]
    fn test_split_sections_char_boundaries() {
        let sections = split_sections("abcdef", 4);
        assert_eq!(sections, vec!["abcd", "ef"]);
        let unicode = split_sections("ééé", 2);
        assert_eq!(unicode, vec!["éé", "é"]);
        assert_eq!(split_sections("", 4), vec![""]);
    }
}
