// ABOUTME: Deploy command implementation.
// ABOUTME: Loads the stack and credentials, connects to the runtime, holds the deploy lock, and runs the pipeline.

use super::runtime_connection::connect_to_runtime;
use berth::config::DeploymentConfig;
use berth::credentials::CredentialProvider;
use berth::deploy::{DeployLock, LockInfo};
use berth::diagnostics::{Diagnostics, Warning};
use berth::error::Result;
use berth::output::Output;
use berth::pipeline::PipelineController;
use berth::stack::StackDefinition;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Deploy the configured stack and return the process exit code.
pub async fn deploy(config: DeploymentConfig, force_lock: bool, mut output: Output) -> Result<i32> {
    output.start_timer();

    // An invalid stack or a missing credential is a configuration error;
    // both are reported before the runtime or the lock is touched
    let stack = StackDefinition::load(&config.stack_path())?;
    let provider = CredentialProvider::from_config(&config).resolve().await?;

    output.progress(&format!(
        "Deploying {} ({} service(s)) from {}",
        stack.name,
        stack.services.len(),
        config.registry
    ));

    let runtime = connect_to_runtime(&config, &output).await?;

    let lock = if config.lock.enabled {
        output.progress("  → Acquiring deploy lock...");
        let dir = match config.lock_dir() {
            Some(dir) => dir,
            None => LockInfo::default_dir()?,
        };
        Some(DeployLock::acquire_within(
            &dir,
            &stack.name,
            force_lock,
            config.timeouts.total(),
        )?)
    } else {
        tracing::warn!("deploy lock disabled; concurrent deploys of {} are not prevented", stack.name);
        None
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel_on_interrupt(cancel.clone());

    let mut report = PipelineController::new(&runtime, &config, &stack, &provider)
        .with_output(output.clone())
        .run(&cancel)
        .await;
    interrupt.abort();

    let mut diag = Diagnostics::default();
    if let Some(lock) = lock
        && let Err(e) = lock.release()
    {
        diag.warn(Warning::lock_release(format!(
            "failed to release deploy lock: {e}"
        )));
    }
    report.warnings.extend(diag.into_warnings());

    output.report(&report);
    Ok(report.exit_code())
}

/// Cancel the pipeline on Ctrl-C. The current step aborts; migration
/// containers are still removed.
fn cancel_on_interrupt(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling the current step");
            cancel.cancel();
        }
    })
}
