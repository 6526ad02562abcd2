//! Masterchain CLI
//!
//! Command-line interface for the masterchain mastering pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;

use masterchain::cli::{commands, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Masterchain v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Masterchain v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Master {
            input,
            output,
            preset,
            presets,
            target_lufs,
        } => commands::master(&input, &output, &preset, presets.as_deref(), target_lufs)
            .with_context(|| format!("failed to master {}", input.display())),
        Commands::Presets { presets } => {
            commands::list_presets(presets.as_deref()).context("failed to load presets")
        }
        Commands::Analyze { input } => commands::analyze(&input)
            .with_context(|| format!("failed to analyze {}", input.display())),
    }
}
