//! genchain CLI Binary
//!
//! Command-line interface for prompt-driven image generation and pipelines.

use clap::Parser;
use genchain::cli::{map_error, Cli, Commands, RunContext};
use genchain::config::{ConfigLoader, GenChainConfig};
use genchain::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = load_config(&cli);
    let logging_config = build_logging_config(&cli, loaded.as_ref().ok());
    let data_dir = loaded
        .as_ref()
        .map(|c| c.storage.data_dir.clone())
        .unwrap_or_else(|_| GenChainConfig::default().storage.data_dir);

    if let Err(e) = init_logging(&logging_config, &data_dir) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("genchain starting");

    let context = match RunContext::new(cli.workspace.clone(), cli.config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error initializing: {}", e);
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    };

    match context.execute(&cli.command).await {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!("Command failed: {}", e);
            // generate failures are surfaced through the notifier by the route
            if !matches!(cli.command, Commands::Generate { .. }) {
                eprintln!("{}", map_error(&e));
            }
            process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<GenChainConfig> {
    let config = match cli.config {
        Some(ref path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load(&cli.workspace)?,
    };
    Ok(config)
}

/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli, config: Option<&GenChainConfig>) -> LoggingConfig {
    let mut logging = config.map(|c| c.logging.clone()).unwrap_or_default();

    if cli.quiet {
        logging.enabled = false;
    }
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        logging.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        logging.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        logging.output = output.clone();
    }
    logging
}
