use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use studygen::cli::commands::{
    handle_cache, handle_config, handle_difficulties, handle_generate, handle_ingest,
    handle_search, handle_status,
};
use studygen::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();
    let verbose = cli.verbose;

    tokio::select! {
        result = run_command(cli.command, format, verbose) => {
            result?;
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, cleaning up...");
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
    }

    Ok(())
}

async fn run_command(
    command: Commands,
    format: studygen::cli::output::OutputFormat,
    verbose: bool,
) -> Result<()> {
    match command {
        Commands::Status => {
            handle_status(format, verbose).await?;
        }
        Commands::Ingest(args) => {
            handle_ingest(args, format, verbose).await?;
        }
        Commands::Search(args) => {
            handle_search(args, format, verbose).await?;
        }
        Commands::Generate(cmd) => {
            handle_generate(cmd, format, verbose).await?;
        }
        Commands::Difficulties(cmd) => {
            handle_difficulties(cmd, format, verbose).await?;
        }
        Commands::Cache(cmd) => {
            handle_cache(cmd, format, verbose).await?;
        }
        Commands::Config(cmd) => {
            handle_config(cmd, format, verbose).await?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
