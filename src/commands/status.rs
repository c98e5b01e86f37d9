// ABOUTME: Status command implementation.
// ABOUTME: Lists every container the stack owns with its service, role, state, and image.

use super::runtime_connection::connect_to_runtime;
use berth::config::DeploymentConfig;
use berth::deploy::StackController;
use berth::error::{EXIT_OK, Result};
use berth::output::{Output, OutputMode};
use berth::runtime::ContainerSummary;
use berth::stack::{StackDefinition, labels};
use serde::Serialize;

#[derive(Serialize)]
struct StatusRow<'a> {
    name: &'a str,
    service: &'a str,
    role: &'a str,
    state: &'a str,
    image: &'a str,
}

impl<'a> From<&'a ContainerSummary> for StatusRow<'a> {
    fn from(c: &'a ContainerSummary) -> Self {
        let label = |key: &str| c.labels.get(key).map(String::as_str).unwrap_or("-");
        StatusRow {
            name: &c.name,
            service: label(labels::SERVICE),
            role: label(labels::ROLE),
            state: &c.state,
            image: &c.image,
        }
    }
}

pub async fn status(config: DeploymentConfig, output: Output) -> Result<i32> {
    let stack = StackDefinition::load(&config.stack_path())?;
    let runtime = connect_to_runtime(&config, &output).await?;

    let containers = StackController::new(config.stop.timeout)
        .inventory(&runtime, &stack)
        .await?;
    let rows: Vec<StatusRow> = containers.iter().map(StatusRow::from).collect();

    if output.mode() == OutputMode::Json {
        for row in &rows {
            if let Ok(json) = serde_json::to_string(row) {
                println!("{json}");
            }
        }
        return Ok(EXIT_OK);
    }

    if rows.is_empty() {
        println!("Stack {}: no containers", stack.name);
        return Ok(EXIT_OK);
    }

    println!("Stack {}:", stack.name);
    println!(
        "{:<32} {:<16} {:<10} {:<10} IMAGE",
        "NAME", "SERVICE", "ROLE", "STATE"
    );
    for row in rows {
        println!(
            "{:<32} {:<16} {:<10} {:<10} {}",
            row.name, row.service, row.role, row.state, row.image
        );
    }

    Ok(EXIT_OK)
}
