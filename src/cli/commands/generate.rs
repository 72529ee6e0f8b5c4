//! Generate command implementation.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::cli::output::{OutputFormat, get_formatter};
use crate::models::{ItemKind, ItemRequest, MAX_RECOVERY_TOPICS, SummaryRequest};
use crate::services::{assemble_fallback_context, format_retrieved_context, select_strategy};
use crate::store::MAX_MEMBERSHIP_IDS;

use super::{Pipeline, parse_source_ids};

#[derive(Debug, Subcommand)]
pub enum GenerateCommand {
    /// Generate flashcards or quiz questions from indexed sources
    Items(ItemsArgs),

    /// Generate a recovery session targeting a learner's difficulties
    Recovery(RecoveryArgs),

    /// Generate a study summary over full source content
    Summary(SummaryArgs),
}

#[derive(Debug, Args)]
pub struct ItemsArgs {
    /// Item kind: flashcards, mc, tf, or case
    #[arg(required = true)]
    pub kind: String,

    #[arg(long, short = 'n', default_value_t = 10, help = "Number of items")]
    pub count: u32,

    #[arg(long, short = 's', required = true, help = "Comma-separated source ids")]
    pub sources: String,

    #[arg(long, short = 'p', help = "Project id (enables context caching)")]
    pub project: Option<String>,

    #[arg(long, short = 'q', help = "Focus query for semantic retrieval")]
    pub query: Option<String>,

    #[arg(long, short = 'd', help = "Difficulty applied to every item")]
    pub difficulty: Option<String>,
}

#[derive(Debug, Args)]
pub struct RecoveryArgs {
    /// Item kind: flashcards, mc, tf, or case
    #[arg(required = true)]
    pub kind: String,

    #[arg(long, short = 'u', required = true, help = "Learner user id")]
    pub user: String,

    #[arg(long, short = 'p', required = true, help = "Project id")]
    pub project: String,

    #[arg(long, short = 's', required = true, help = "Comma-separated source ids")]
    pub sources: String,

    #[arg(long, short = 'n', default_value_t = 10, help = "Number of items")]
    pub count: u32,

    #[arg(long, help = "Subject name used in strategy queries; defaults to the project id")]
    pub subject: Option<String>,

    #[arg(long, short = 'd', help = "Difficulty applied to every item")]
    pub difficulty: Option<String>,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[arg(long, short = 's', required = true, help = "Comma-separated source ids")]
    pub sources: String,

    #[arg(long, short = 'p', help = "Project id")]
    pub project: Option<String>,

    #[arg(long, help = "Desired output size in tokens")]
    pub output_tokens: Option<u32>,
}

pub async fn handle_generate(
    cmd: GenerateCommand,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    match cmd {
        GenerateCommand::Items(args) => handle_items(args, format, verbose).await,
        GenerateCommand::Recovery(args) => handle_recovery(args, format, verbose).await,
        GenerateCommand::Summary(args) => handle_summary(args, format, verbose).await,
    }
}

async fn handle_items(args: ItemsArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let kind: ItemKind = args.kind.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let pipeline = Pipeline::load()?;
    let formatter = get_formatter(format);
    let source_ids = parse_source_ids(&args.sources)?;

    let context = match &args.query {
        Some(query) => {
            retrieved_or_fallback_context(&pipeline, &[query.clone()], &source_ids, verbose)
                .await?
        }
        None => fallback_context(&pipeline, &source_ids).await?,
    };
    if context.trim().is_empty() {
        anyhow::bail!("no indexed content available for the given sources");
    }

    let request = ItemRequest {
        kind,
        count: args.count,
        difficulty: args.difficulty,
        subject_id: args.project,
        context,
        instructions: None,
    };

    let output = pipeline
        .orchestrator()
        .generate_items(&request)
        .await
        .context("generation failed")?;

    print!("{}", formatter.items(&output));
    Ok(())
}

async fn handle_recovery(args: RecoveryArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let kind: ItemKind = args.kind.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let pipeline = Pipeline::load()?;
    let formatter = get_formatter(format);
    let source_ids = parse_source_ids(&args.sources)?;
    let subject = args.subject.as_deref().unwrap_or(&args.project);

    let difficulties = pipeline
        .store
        .unresolved_difficulties(&args.user, &args.project, MAX_RECOVERY_TOPICS)
        .await
        .context("failed to load difficulties")?;
    let strategy = select_strategy(&difficulties, subject);

    if verbose {
        eprintln!("Recovery strategy: {}", strategy.kind);
        eprintln!("  Focus: {}%", strategy.focus_percentage);
        eprintln!("  Queries: {}", strategy.queries.len());
        eprintln!();
    }

    let context =
        retrieved_or_fallback_context(&pipeline, &strategy.queries, &source_ids, verbose).await?;
    if context.trim().is_empty() {
        anyhow::bail!("no indexed content available for the given sources");
    }

    let request = ItemRequest {
        kind,
        count: args.count,
        difficulty: args.difficulty,
        subject_id: Some(args.project),
        context,
        instructions: Some(strategy.instructions),
    };

    let output = pipeline
        .orchestrator()
        .generate_items(&request)
        .await
        .context("recovery generation failed")?;

    print!("{}", formatter.items(&output));
    Ok(())
}

async fn handle_summary(args: SummaryArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let pipeline = Pipeline::load()?;
    let formatter = get_formatter(format);
    let source_ids = parse_source_ids(&args.sources)?;

    // Summaries cover the full stored content, not a retrieved subset
    let content = assemble_fallback_context(pipeline.store.as_ref(), &source_ids, usize::MAX)
        .await
        .context("failed to load source content")?;
    if content.trim().is_empty() {
        anyhow::bail!("no indexed content available for the given sources");
    }

    if verbose {
        eprintln!("Summarizing {} chars of source content", content.len());
    }

    let request = SummaryRequest {
        subject_id: args.project,
        content,
        desired_output_tokens: args.output_tokens,
    };

    let output = pipeline
        .orchestrator()
        .generate_summary(&request)
        .await
        .context("summary generation failed")?;

    print!("{}", formatter.summary(&output));
    Ok(())
}

/// Retrieve focused context for the queries, falling back to raw chunk
/// concatenation when the sources have no embeddings or nothing clears
/// the similarity threshold.
async fn retrieved_or_fallback_context(
    pipeline: &Pipeline,
    queries: &[String],
    source_ids: &[String],
    verbose: bool,
) -> Result<String> {
    if any_embeddings(pipeline, source_ids).await? {
        let results = pipeline
            .retriever()
            .search_many(
                queries,
                source_ids,
                pipeline.config.retrieval.token_budget,
                &pipeline.config.provider.embedding_model,
            )
            .await
            .context("semantic retrieval failed")?;

        if !results.is_empty() {
            if verbose {
                let tokens: u32 = results.iter().map(|r| r.token_count).sum();
                eprintln!("Retrieved {} chunks ({tokens} tokens)", results.len());
            }
            return Ok(format_retrieved_context(&results));
        }
    }

    if verbose {
        eprintln!("No semantic matches; using raw chunk content");
    }
    fallback_context(pipeline, source_ids).await
}

async fn fallback_context(pipeline: &Pipeline, source_ids: &[String]) -> Result<String> {
    assemble_fallback_context(
        pipeline.store.as_ref(),
        source_ids,
        pipeline.config.limits.max_context_chars,
    )
    .await
    .context("failed to load source content")
}

async fn any_embeddings(pipeline: &Pipeline, source_ids: &[String]) -> Result<bool> {
    for batch in source_ids.chunks(MAX_MEMBERSHIP_IDS) {
        if pipeline
            .store
            .has_embeddings(batch)
            .await
            .context("failed to check embeddings")?
        {
            return Ok(true);
        }
    }
    Ok(false)
}
