// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use berth::output::OutputMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "berth")]
#[command(about = "Single-host deployment of container stacks for Docker and Podman")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create template berth.yml and stack.yml files
    Init {
        /// Stack name for the template
        #[arg(long)]
        stack_name: Option<String>,

        /// Registry endpoint for the template
        #[arg(long)]
        registry: Option<String>,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Deploy the stack: pull, tear down, migrate, start, reclaim
    Deploy {
        /// Path to the deployment config (default: discovered in the current directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stack definition to deploy instead of the configured one
        #[arg(long)]
        stack: Option<PathBuf>,

        /// Registry endpoint to use instead of the configured one
        #[arg(long)]
        registry: Option<String>,

        /// Break an existing deploy lock
        #[arg(long, conflicts_with = "no_lock")]
        force_lock: bool,

        /// Do not take the deploy lock
        #[arg(long)]
        no_lock: bool,
    },

    /// Show the stack's containers
    Status {
        /// Path to the deployment config (default: discovered in the current directory)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
