//! strata -- attribute container layer files to packages and export SBOMs.

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use clap::Parser;
use colored::Colorize;

use strata_core::config::{GeneralConfig, StrataConfig};

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);

    match cli.command {
        Commands::Config(args) => {
            logging::init_tracing(&GeneralConfig::default(), cli.log_level.as_deref())
                .map_err(|e| CliError::Command(e.to_string()))?;
            commands::config::execute(args, cli.config.as_deref(), &writer).await
        }
        Commands::Scan(args) => {
            let config = StrataConfig::load_or_default(cli.config.as_deref()).await?;
            logging::init_tracing(&config.general, cli.log_level.as_deref())
                .map_err(|e| CliError::Config(e.to_string()))?;
            strata_core::metrics::describe_all();

            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                config = ?cli.config,
                "strata starting"
            );
            commands::scan::execute(args, config, &writer).await
        }
    }
}
