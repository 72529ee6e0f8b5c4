//! Status command implementation.

use anyhow::{Context, Result};

use crate::cli::output::OutputFormat;
use crate::models::{API_KEY_ENV, Config};

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load().context("failed to load config")?;
    let store_path = config
        .store
        .resolve_path()
        .context("could not determine store path")?;
    let api_key_set = config.provider.resolve_api_key().is_some();

    if format == OutputFormat::Json {
        let status = serde_json::json!({
            "provider_url": config.provider.base_url,
            "model": config.provider.model,
            "fallback_model": config.provider.fallback_model,
            "embedding_model": config.provider.embedding_model,
            "api_key_set": api_key_set,
            "store_path": store_path.display().to_string(),
            "store_exists": store_path.exists(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Provider:");
    println!("  URL: {}", config.provider.base_url);
    println!(
        "  Models: {} (fallback: {})",
        config.provider.model, config.provider.fallback_model
    );
    println!(
        "  Embedding: {} (fallback: {})",
        config.provider.embedding_model, config.provider.fallback_embedding_model
    );
    if api_key_set {
        println!("  API key: configured");
    } else {
        println!("  API key: not set (export {API_KEY_ENV})");
    }
    println!("Store:");
    println!(
        "  Path: {} ({})",
        store_path.display(),
        if store_path.exists() {
            "exists"
        } else {
            "not created yet"
        }
    );
    println!("Chunking:");
    println!(
        "  {} tokens per chunk, {} overlap",
        config.chunking.chunk_size, config.chunking.chunk_overlap
    );

    Ok(())
}
