//! CLI entry point for mesh-trends.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use mesh_trends::config::load_default_file_config;
use mesh_trends::pipeline::ProcessExit;
use tracing::debug;

mod cli;
mod commands;
mod terminal;

use cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(exit) => ExitCode::from(exit.code()),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}

async fn run() -> Result<ProcessExit> {
    // Parse first so --help works without logs.
    let cli = Cli::parse();

    let loaded = load_default_file_config();
    let configured_verbosity = loaded
        .as_ref()
        .ok()
        .and_then(|loaded| loaded.config.as_ref())
        .and_then(|config| config.verbosity);
    let no_color = terminal::no_color_env_requested() || terminal::is_dumb_terminal();
    let log_level = cli.log_level(configured_verbosity);
    terminal::init_tracing(log_level, no_color);
    let quiet = log_level == "error";

    let loaded = loaded?;
    if let Some(path) = loaded.path.as_deref().filter(|_| loaded.loaded_from_file()) {
        debug!(path = %path.display(), "Loaded config file");
    }
    let file_config = loaded.config.as_ref();

    match &cli.command {
        Command::Analyze(args) => {
            commands::run_analyze_command(args, file_config, quiet).await
        }
        Command::Aggregate(args) => commands::run_aggregate_command(args, file_config),
        Command::Config {
            command: ConfigCommand::Show,
        } => {
            commands::run_config_show_command(&loaded)?;
            Ok(ProcessExit::Success)
        }
    }
}
