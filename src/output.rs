// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::pipeline::{DeploymentReport, ReportStatus, Step, StepOutcome, StepResult};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
#[derive(Debug, Clone)]
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Default for Output {
    fn default() -> Self {
        Self::new(OutputMode::Quiet)
    }
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Mark the start of a pipeline step.
    pub fn step_started(&self, step: Step) {
        match self.mode {
            OutputMode::Normal => println!("  → {}...", step.label()),
            OutputMode::Quiet => {}
            OutputMode::Json => emit(&StepEvent {
                event: "step",
                step,
                status: "started",
                kind: None,
                cause: None,
                duration_secs: None,
            }),
        }
    }

    /// Mark the end of a pipeline step.
    pub fn step_finished(&self, result: &StepResult) {
        let secs = result.elapsed.as_secs_f64();
        match self.mode {
            OutputMode::Normal => match &result.outcome {
                StepOutcome::Succeeded => {
                    println!("  ✓ {} ({:.1}s)", result.step.label(), secs);
                }
                StepOutcome::Warning(failure) => {
                    println!("  ! {} ({:.1}s): {}", result.step.label(), secs, failure.cause);
                }
                StepOutcome::Failed(failure) => {
                    eprintln!("  ✗ {} ({:.1}s): {}", result.step.label(), secs, failure);
                }
            },
            OutputMode::Quiet => {}
            OutputMode::Json => {
                let (status, failure) = match &result.outcome {
                    StepOutcome::Succeeded => ("succeeded", None),
                    StepOutcome::Warning(f) => ("warning", Some(f)),
                    StepOutcome::Failed(f) => ("failed", Some(f)),
                };
                emit(&StepEvent {
                    event: "step",
                    step: result.step,
                    status,
                    kind: failure.map(|f| f.kind.to_string()),
                    cause: failure.map(|f| f.cause.as_str()),
                    duration_secs: Some(secs),
                });
            }
        }
    }

    /// Print the final report.
    pub fn report(&self, report: &DeploymentReport) {
        if self.mode == OutputMode::Json {
            match report.to_json() {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::error!("failed to serialize report: {}", e),
            }
            return;
        }

        for warning in &report.warnings {
            self.warning(&warning.message);
        }

        match (report.status, report.failure()) {
            (ReportStatus::Succeeded, _) => {
                self.success(&format!("Deployed {}", report.stack));
            }
            (ReportStatus::Failed, Some((step, failure))) => {
                self.error(&format!(
                    "Deployment of {} failed while {}: {}",
                    report.stack, step, failure
                ));
            }
            (ReportStatus::Degraded, Some((step, failure))) => {
                self.error(&format!(
                    "Deployment of {} failed while {}: {}; the stack may be down",
                    report.stack, step, failure
                ));
            }
            (_, None) => self.error(&format!("Deployment of {} failed", report.stack)),
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => emit(&self.event("success", message)),
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => emit(&self.event("warning", message)),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(&self.event("error", message)) {
                    eprintln!("{json}");
                }
            }
        }
    }

    fn event<'a>(&self, event: &'a str, message: &'a str) -> JsonEvent<'a> {
        JsonEvent {
            event,
            message,
            duration_secs: self.start_time.map(|_| self.elapsed_secs()),
        }
    }
}

fn emit<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct StepEvent<'a> {
    event: &'a str,
    step: Step,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
