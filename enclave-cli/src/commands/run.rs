//! Run command implementation

use anyhow::{Context, Result};
use enclave_core::{ExitOutcome, InvocationSpec};
use enclave_namespace::Launcher;

use crate::cli::InvocationArgs;

pub fn execute(args: InvocationArgs, verbose: bool) -> Result<ExitOutcome> {
    // Nothing is spawned until both the invocation and the config check out
    let invocation = InvocationSpec::from_argv(&args.command)?;
    let config = args.isolation.into_config()?;

    tracing::info!(
        command = %invocation,
        hostname = %config.hostname,
        rootfs = %config.rootfs.display(),
        "Starting isolated command"
    );

    let outcome = Launcher::new(config)
        .with_verbose(verbose)
        .launch(&invocation)
        .context("Failed to launch isolated process")?;

    if !outcome.success() {
        tracing::debug!(outcome = %outcome, "Command did not succeed");
    }

    Ok(outcome)
}
