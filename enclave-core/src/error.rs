//! Error types for Enclave

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exit code for a malformed invocation or configuration (same as clap usage errors)
pub const EXIT_INVALID_INVOCATION: i32 = 2;
/// Exit code when the kernel refuses to create the namespaces
pub const EXIT_NAMESPACE_FAILURE: i32 = 125;
/// Exit code when hostname, chroot, chdir or the proc mount fails
pub const EXIT_SETUP_FAILURE: i32 = 126;
/// Exit code when the target command cannot be started
pub const EXIT_TARGET_NOT_STARTED: i32 = 127;

/// Isolation setup step performed by the bootstrapper, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStep {
    /// `sethostname(2)` inside the UTS namespace
    Hostname,
    /// `chroot(2)` into the isolation root
    Chroot,
    /// `chdir("/")` relative to the new root
    Chdir,
    /// Mounting the proc filesystem
    MountProc,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hostname => "set hostname",
            Self::Chroot => "change root",
            Self::Chdir => "change directory",
            Self::MountProc => "mount proc",
        };
        f.write_str(name)
    }
}

/// Enclave error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Missing or unsupported subcommand, or an empty target command
    #[error("Invalid invocation: {message}")]
    InvalidInvocation {
        /// Error message
        message: String,
    },

    /// Invalid isolation configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// The kernel refused to create the requested namespaces
    #[error("Namespace creation failed: {message}")]
    NamespaceCreation {
        /// Error message
        message: String,
    },

    /// A bootstrap step failed before the target command was started
    #[error("Isolation setup failed at '{step}': {message}")]
    IsolationSetup {
        /// Step that failed
        step: SetupStep,
        /// Error message
        message: String,
    },

    /// The target command could not be started
    #[error("Failed to execute '{program}': {source}")]
    TargetExecution {
        /// Program that could not be started
        program: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// Unmounting after the target exited failed
    #[error("Cleanup failed: {message}")]
    Cleanup {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),
}

impl Error {
    /// Shorthand for [`Error::InvalidInvocation`]
    pub fn invalid_invocation(message: impl Into<String>) -> Self {
        Self::InvalidInvocation {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::InvalidConfig`]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Process exit code reported for this error
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidInvocation { .. } | Self::InvalidConfig { .. } => EXIT_INVALID_INVOCATION,
            Self::NamespaceCreation { .. } => EXIT_NAMESPACE_FAILURE,
            Self::IsolationSetup { .. } => EXIT_SETUP_FAILURE,
            Self::TargetExecution { .. } => EXIT_TARGET_NOT_STARTED,
            Self::Cleanup { .. } | Self::Io(_) | Self::System(_) => 1,
        }
    }
}

/// Result type alias for Enclave operations
pub type Result<T> = std::result::Result<T, Error>;
