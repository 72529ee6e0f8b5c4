//! Ingest command implementation.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::output::{OutputFormat, get_formatter};
use crate::utils::read_file_content;

use super::Pipeline;

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Path to the source document (plain text or markdown)
    #[arg(required = true)]
    pub file: PathBuf,

    /// Source id; defaults to the file stem
    #[arg(long, short = 's')]
    pub source: Option<String>,

    /// Project the source belongs to; its context cache is invalidated
    #[arg(long, short = 'p')]
    pub project: Option<String>,
}

pub async fn handle_ingest(args: IngestArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let pipeline = Pipeline::load()?;
    let formatter = get_formatter(format);
    let start = Instant::now();

    let source_id = match args.source {
        Some(source) => source,
        None => args
            .file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .context("cannot derive a source id from the file name")?,
    };

    let text = read_file_content(&args.file, pipeline.config.chunking.max_file_size)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("chunking and embedding...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));

    let service = pipeline.ingest_service()?;
    let report = service
        .ingest_text(&source_id, &text)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    spinner.finish_and_clear();

    // Re-ingested content invalidates any cached project context
    if let Some(project) = &args.project {
        pipeline.cache_manager().invalidate(project, "context").await;
    }

    if verbose {
        eprintln!("Ingested in {}ms", start.elapsed().as_millis());
    }

    print!("{}", formatter.ingest_report(&source_id, &report));
    Ok(())
}
