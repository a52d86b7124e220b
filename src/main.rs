#![allow(dead_code)]

mod cli;
mod config;
mod deployment;
mod execution;
mod http;
mod logging;
mod metrics;
mod types;
mod webhook;

use clap::Parser;
use tracing::info;

use crate::cli::{Cli, Commands, RunArgs};
use crate::types::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config is loaded before logging so its level and format apply; errors
    // resurface when the command reloads it
    let system_config = match &cli.command {
        Some(Commands::Version) => None,
        _ => cli.load_config().ok(),
    };

    crate::logging::init(
        cli.log_level_override(),
        cli.log_format_override(),
        cli.log_file.as_deref(),
        system_config.as_ref(),
    )?;

    crate::metrics::init_metrics();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting releasehook");

    match cli.command.clone().unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => cli::run_server(cli, args, system_config).await,
        Commands::Validate => cli::validate_config(cli, system_config).await,
        Commands::Version => cli::show_version().await,
    }
}
