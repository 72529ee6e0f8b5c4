//! Config command implementation.

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{OutputFormat, get_formatter};
use crate::models::Config;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a default configuration file
    Init {
        #[arg(long, short = 'f', help = "Overwrite an existing config")]
        force: bool,
    },

    /// Show the resolved configuration
    Show,

    /// Show the configuration file path
    Path,
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { force } => {
            let path = Config::config_path().context("could not determine config directory")?;
            if path.exists() && !force {
                anyhow::bail!(
                    "config already exists at {}\nUse --force to overwrite.",
                    path.display()
                );
            }
            Config::default().save().context("failed to write config")?;
            print!(
                "{}",
                formatter.message(&format!("Wrote default config to {}", path.display()))
            );
        }

        ConfigCommand::Show => {
            let config = Config::load().context("failed to load config")?;
            let rendered = toml::to_string_pretty(&config).context("failed to render config")?;
            print!("{rendered}");
        }

        ConfigCommand::Path => {
            let path = Config::config_path().context("could not determine config directory")?;
            print!("{}", formatter.message(&path.display().to_string()));
        }
    }

    Ok(())
}
