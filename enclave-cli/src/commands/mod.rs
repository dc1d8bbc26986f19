use crate::cli::Commands;
use anyhow::Result;
use enclave_core::ExitOutcome;

pub mod bootstrap;
pub mod run;

/// Dispatch command to appropriate handler
pub fn dispatch(command: Commands, verbose: bool) -> Result<ExitOutcome> {
    match command {
        Commands::Run(args) => run::execute(args, verbose),
        Commands::Bootstrap(args) => bootstrap::execute(args),
    }
}
