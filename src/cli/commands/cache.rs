//! Cache command implementation.

use anyhow::Result;
use clap::Subcommand;

use crate::cli::output::{OutputFormat, get_formatter};

use super::Pipeline;

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Delete expired cache entries from the store
    Sweep,

    /// Drop the cache for a subject, provider-side and store-side
    Invalidate {
        #[arg(long, short = 's', required = true, help = "Subject (project) id")]
        subject: String,

        #[arg(long, default_value = "context", help = "Cache type")]
        cache_type: String,
    },
}

pub async fn handle_cache(cmd: CacheCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    let pipeline = Pipeline::load()?;
    let formatter = get_formatter(format);
    let manager = pipeline.cache_manager();

    match cmd {
        CacheCommand::Sweep => {
            let removed = manager.sweep_expired().await;
            print!(
                "{}",
                formatter.message(&format!("Removed {removed} expired cache entries"))
            );
        }
        CacheCommand::Invalidate {
            subject,
            cache_type,
        } => {
            manager.invalidate(&subject, &cache_type).await;
            print!(
                "{}",
                formatter.message(&format!("Invalidated {cache_type} cache for {subject}"))
            );
        }
    }

    Ok(())
}
