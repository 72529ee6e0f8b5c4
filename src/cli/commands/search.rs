//! Search command implementation.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::{OutputFormat, get_formatter};

use super::{Pipeline, parse_source_ids};

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Search query text")]
    pub query: String,

    #[arg(
        long,
        short = 's',
        required = true,
        help = "Comma-separated source ids to search"
    )]
    pub sources: String,

    #[arg(long, short = 'b', help = "Token budget for accumulated results")]
    pub budget: Option<u32>,

    #[arg(long, help = "Minimum similarity threshold (0.0-1.0)")]
    pub threshold: Option<f32>,
}

pub async fn handle_search(args: SearchArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("search query cannot be empty");
    }

    if let Some(threshold) = args.threshold
        && !(0.0..=1.0).contains(&threshold)
    {
        anyhow::bail!("threshold must be between 0.0 and 1.0");
    }

    let pipeline = Pipeline::load()?;
    let formatter = get_formatter(format);
    let source_ids = parse_source_ids(&args.sources)?;
    let budget = args.budget.unwrap_or(pipeline.config.retrieval.token_budget);
    if budget == 0 {
        anyhow::bail!("token budget must be at least 1");
    }

    let retriever = match args.threshold {
        Some(threshold) => pipeline.retriever_with_threshold(threshold),
        None => pipeline.retriever(),
    };

    let start = Instant::now();
    let results = retriever
        .search(
            query,
            &source_ids,
            budget,
            &pipeline.config.provider.embedding_model,
        )
        .await
        .context("search failed")?;

    if verbose {
        eprintln!("Query: \"{query}\"");
        eprintln!("  Sources: {}", source_ids.len());
        eprintln!("  Budget: {budget} tokens");
        eprintln!("  Took: {}ms", start.elapsed().as_millis());
        eprintln!();
    }

    print!("{}", formatter.search_results(query, &results));
    Ok(())
}
