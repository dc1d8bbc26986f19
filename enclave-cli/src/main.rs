//! Enclave CLI
//!
//! Runs one foreground command inside new UTS, PID and mount namespaces
//! with its own hostname, root directory and proc mount.

use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::Cli;

fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    init_logging(cli.verbose);

    // Execute the command
    let result = commands::dispatch(cli.command, cli.verbose);

    match result {
        Ok(outcome) => process::exit(outcome.code()),
        Err(e) => {
            let code = e
                .downcast_ref::<enclave_core::Error>()
                .map_or(1, enclave_core::Error::exit_code);
            eprintln!("Error: {e:#}");
            process::exit(code);
        }
    }
}

/// Logs go to stderr so the target's stdout is left alone.
/// `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
