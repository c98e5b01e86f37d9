// ABOUTME: Command implementations for the CLI.
// ABOUTME: Each subcommand has its own module.

mod deploy;
mod runtime_connection;
mod status;

pub use deploy::deploy;
pub use status::status;

use berth::config::DeploymentConfig;
use berth::error::Result;
use std::path::Path;

/// Load the config from an explicit path, or discover it in `cwd`.
pub fn load_config(cwd: &Path, explicit: Option<&Path>) -> Result<DeploymentConfig> {
    match explicit {
        Some(path) => DeploymentConfig::load(path),
        None => DeploymentConfig::discover(cwd),
    }
}
