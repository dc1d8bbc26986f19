//! CLI argument definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use enclave_core::{Error, Result};
use enclave_namespace::IsolationConfig;
use enclave_namespace::config::{DEFAULT_HOSTNAME, DEFAULT_PROC_MOUNT};

#[derive(Parser, Debug)]
#[command(name = "enclave")]
#[command(about = "Run a command in isolated UTS, PID and mount namespaces", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command in an isolated environment
    Run(InvocationArgs),

    /// Finish isolation from inside the new namespaces (internal)
    #[command(hide = true)]
    Bootstrap(InvocationArgs),
}

#[derive(Args, Debug)]
pub struct InvocationArgs {
    #[command(flatten)]
    pub isolation: IsolationArgs,

    /// Command to run, followed by its parameters
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct IsolationArgs {
    /// Hostname inside the isolated environment
    #[arg(long, env = "ENCLAVE_HOSTNAME", default_value = DEFAULT_HOSTNAME)]
    pub hostname: String,

    /// Existing root filesystem tree to chroot into
    #[arg(long, env = "ENCLAVE_ROOTFS")]
    pub rootfs: Option<PathBuf>,

    /// Mount point for proc, inside the new root
    #[arg(long, env = "ENCLAVE_PROC_MOUNT", default_value = DEFAULT_PROC_MOUNT)]
    pub proc_mount: PathBuf,
}

impl IsolationArgs {
    /// Build and validate the isolation configuration
    pub fn into_config(self) -> Result<IsolationConfig> {
        let Some(rootfs) = self.rootfs else {
            return Err(Error::invalid_config(
                "no root filesystem configured (use --rootfs or ENCLAVE_ROOTFS)",
            ));
        };

        let config = IsolationConfig::new(rootfs)
            .with_hostname(self.hostname)
            .with_proc_mount(self.proc_mount);
        config.validate()?;

        Ok(config)
    }
}
