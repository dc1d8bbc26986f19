//! Namespace isolation for a single foreground command
//!
//! Two phases of one re-executed program:
//! - [`Launcher`] - runs in the caller, clones a child into new UTS, PID and
//!   mount namespaces and re-executes this binary in bootstrap mode
//! - [`Bootstrapper`] - runs in that child, sets the hostname, changes root,
//!   mounts proc, runs the target and unmounts proc again

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod bootstrap;
pub mod config;
pub mod inspect;
pub mod launcher;
pub mod self_exe;

pub use bootstrap::{BootstrapState, Bootstrapper, IsolationOps, SystemOps};
pub use config::{IsolationConfig, NamespaceConfig};
pub use inspect::NamespaceInfo;
pub use launcher::{BOOTSTRAP_COMMAND, ChildProcessHandle, Launcher};
pub use self_exe::{InstalledBinary, ProcSelfExe, SelfExecutable};
