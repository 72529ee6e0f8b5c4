//! CLI module for the study material pipeline.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use output::OutputFormat;

/// Generate study material from your own source documents.
#[derive(Debug, Parser)]
#[command(name = "studygen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, value_enum, help = "Output format")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show resolved configuration and store location
    Status,

    /// Chunk and embed a source document into the index
    Ingest(commands::IngestArgs),

    /// Search indexed chunks semantically under a token budget
    Search(commands::SearchArgs),

    /// Generate study material (items, recovery sessions, summaries)
    #[command(subcommand)]
    Generate(commands::GenerateCommand),

    /// Manage learner difficulty topics
    #[command(subcommand)]
    Difficulties(commands::DifficultiesCommand),

    /// Manage provider context caches
    #[command(subcommand)]
    Cache(commands::CacheCommand),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
