// ABOUTME: Entry point for the berth CLI application.
// ABOUTME: Parses arguments, sets up logging, and dispatches to command handlers.

mod cli;
mod commands;

use berth::config::{self, Overrides};
use berth::error::{EXIT_OK, Result};
use berth::output::Output;
use clap::Parser;
use cli::{Cli, Commands};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise the verbose flag picks the level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(cli.output_mode());
    let code = match run(cli, output.clone()).await {
        Ok(code) => code,
        Err(e) => {
            output.error(&e.to_string());
            e.exit_code()
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli, output: Output) -> Result<i32> {
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Init {
            stack_name,
            registry,
            force,
        } => {
            config::init_config(&cwd, stack_name.as_deref(), registry.as_deref(), force)?;
            output.success("Created berth.yml and stack.yml");
            Ok(EXIT_OK)
        }
        Commands::Deploy {
            config,
            stack,
            registry,
            force_lock,
            no_lock,
        } => {
            let config = commands::load_config(&cwd, config.as_deref())?.with_overrides(
                Overrides {
                    stack,
                    registry,
                    no_lock,
                },
            )?;
            commands::deploy(config, force_lock, output).await
        }
        Commands::Status { config } => {
            let config = commands::load_config(&cwd, config.as_deref())?;
            commands::status(config, output).await
        }
    }
}
