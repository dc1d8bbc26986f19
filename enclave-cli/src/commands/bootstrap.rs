//! Bootstrap command implementation
//!
//! Entry point of the re-executed child. Not meant to be run by hand.

use anyhow::{Context, Result};
use enclave_core::{ExitOutcome, InvocationSpec};
use enclave_namespace::Bootstrapper;

use crate::cli::InvocationArgs;

pub fn execute(args: InvocationArgs) -> Result<ExitOutcome> {
    let invocation = InvocationSpec::from_argv(&args.command)?;
    let context = args.isolation.into_config()?;

    Bootstrapper::new(context)
        .run(&invocation)
        .context("Bootstrap failed")
}
