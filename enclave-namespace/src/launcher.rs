//! Launching the bootstrap phase inside new namespaces
//!
//! This module uses `unsafe` for clone() which is inherently unsafe
//! but necessary for the child to start as PID 1 of its PID namespace.

#![allow(unsafe_code)]

use std::ffi::{CString, OsString};
use std::os::unix::ffi::OsStrExt;

use enclave_core::error::{EXIT_NAMESPACE_FAILURE, EXIT_TARGET_NOT_STARTED};
use enclave_core::{Error, ExitOutcome, InvocationSpec, ProcessId, Result};
use nix::mount::{MsFlags, mount};
use nix::sched::clone;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::execv;
use tracing::{debug, error, info, warn};

use crate::config::{IsolationConfig, NamespaceConfig};
use crate::inspect::NamespaceInfo;
use crate::self_exe::{ProcSelfExe, SelfExecutable};

/// Marker subcommand the re-executed binary is started with
pub const BOOTSTRAP_COMMAND: &str = "bootstrap";

const CHILD_STACK_SIZE: usize = 1024 * 1024;

/// Starts an invocation in new UTS, PID and mount namespaces
///
/// The launcher re-executes this program (see [`SelfExecutable`]) in
/// bootstrap mode; the bootstrap phase finishes isolation and runs the
/// target. Standard streams are inherited untouched.
#[derive(Debug, Clone)]
pub struct Launcher<E = ProcSelfExe> {
    isolation: IsolationConfig,
    executable: E,
    verbose: bool,
}

impl Launcher<ProcSelfExe> {
    /// Create a launcher that re-executes through `/proc/self/exe`
    #[must_use]
    pub const fn new(isolation: IsolationConfig) -> Self {
        Self {
            isolation,
            executable: ProcSelfExe,
            verbose: false,
        }
    }
}

impl<E: SelfExecutable> Launcher<E> {
    /// Use a different binary for the bootstrap phase
    #[must_use]
    pub fn with_executable<F: SelfExecutable>(self, executable: F) -> Launcher<F> {
        Launcher {
            isolation: self.isolation,
            executable,
            verbose: self.verbose,
        }
    }

    /// Forward verbose logging to the bootstrap phase
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Get the isolation configuration
    #[must_use]
    pub const fn isolation(&self) -> &IsolationConfig {
        &self.isolation
    }

    /// Arguments (after argv\[0\]) the bootstrap phase is started with
    #[must_use]
    pub fn bootstrap_args(&self, invocation: &InvocationSpec) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![BOOTSTRAP_COMMAND.into()];

        if self.verbose {
            args.push("--verbose".into());
        }

        args.push("--hostname".into());
        args.push(self.isolation.hostname.clone().into());
        args.push("--rootfs".into());
        args.push(self.isolation.rootfs.clone().into_os_string());
        args.push("--proc-mount".into());
        args.push(self.isolation.proc_mount.clone().into_os_string());

        // Everything after `--` is the target, even if it looks like a flag
        args.push("--".into());
        args.extend(invocation.to_argv().into_iter().map(OsString::from));

        args
    }

    /// Launch the invocation and wait for it to finish
    ///
    /// # Errors
    /// Returns [`Error::NamespaceCreation`] if the kernel refuses the namespaces,
    /// or a configuration error before anything is spawned.
    pub fn launch(&self, invocation: &InvocationSpec) -> Result<ExitOutcome> {
        let child = self.spawn(invocation)?;
        let outcome = child.wait()?;

        info!(outcome = %outcome, "Isolated process finished");
        Ok(outcome)
    }

    /// Spawn the bootstrap process without waiting for it
    ///
    /// # Errors
    /// Same as [`Launcher::launch`].
    pub fn spawn(&self, invocation: &InvocationSpec) -> Result<ChildProcessHandle> {
        self.isolation.validate()?;

        let executable = self.executable.executable()?;
        let mut args = vec![executable.into_os_string()];
        args.extend(self.bootstrap_args(invocation));
        let argv = to_c_strings(&args)?;

        let namespaces = NamespaceConfig::isolated();
        let flags = namespaces.to_clone_flags();
        let private_mounts = namespaces.private_mounts;

        info!(
            namespaces = ?namespaces.enabled_namespaces(),
            command = %invocation,
            "Launching isolated process"
        );

        let mut stack = vec![0u8; CHILD_STACK_SIZE];

        // SAFETY: no other threads exist at this point, and the child only
        // remounts `/` and execs before touching anything else.
        let pid = unsafe {
            clone(
                Box::new(|| enter_bootstrap(&argv, private_mounts)),
                &mut stack,
                flags,
                Some(libc::SIGCHLD),
            )
        }
        .map_err(|e| {
            error!(error = %e, namespaces = ?namespaces.enabled_namespaces(), "clone failed");
            namespace_error(e)
        })?;

        let child = ChildProcessHandle {
            pid: ProcessId::from(pid),
        };

        match child.namespaces() {
            Ok(ns) => debug!(pid = %child.pid, namespaces = %ns, "Bootstrap process started"),
            Err(e) => debug!(pid = %child.pid, error = %e, "Bootstrap process started"),
        }

        Ok(child)
    }
}

/// Runs in the cloned child: detach mount propagation, then exec the bootstrap phase
fn enter_bootstrap(argv: &[CString], private_mounts: bool) -> isize {
    if private_mounts {
        if let Err(e) = mount(
            None::<&str>,
            "/",
            None::<&str>,
            MsFlags::MS_REC | MsFlags::MS_PRIVATE,
            None::<&str>,
        ) {
            eprintln!("enclave: failed to make mounts private: {e}");
            return EXIT_NAMESPACE_FAILURE as isize;
        }
    }

    let Some(path) = argv.first() else {
        return EXIT_TARGET_NOT_STARTED as isize;
    };

    // execv only returns on failure
    let Err(e) = execv(path, argv);
    eprintln!("enclave: failed to execute {}: {e}", path.to_string_lossy());
    EXIT_TARGET_NOT_STARTED as isize
}

fn to_c_strings(args: &[OsString]) -> Result<Vec<CString>> {
    args.iter()
        .map(|arg| {
            CString::new(arg.as_bytes())
                .map_err(|e| Error::invalid_invocation(format!("invalid argument: {e}")))
        })
        .collect()
}

fn namespace_error(errno: nix::Error) -> Error {
    let message = if errno == nix::Error::EPERM {
        format!("clone failed: {errno} (creating namespaces requires root or CAP_SYS_ADMIN)")
    } else {
        format!("clone failed: {errno}")
    };

    Error::NamespaceCreation { message }
}

/// Handle to the spawned bootstrap process
#[derive(Debug)]
#[must_use = "the bootstrap process must be waited on"]
pub struct ChildProcessHandle {
    pid: ProcessId,
}

impl ChildProcessHandle {
    /// Host-side PID of the bootstrap process
    pub const fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Namespace ids of the bootstrap process
    ///
    /// # Errors
    /// Returns error once the process has been reaped
    pub fn namespaces(&self) -> Result<NamespaceInfo> {
        NamespaceInfo::for_pid(self.pid)
    }

    /// Block until the bootstrap process exits and reap it
    ///
    /// # Errors
    /// Returns error if `waitpid` fails for a reason other than `EINTR`
    pub fn wait(self) -> Result<ExitOutcome> {
        debug!(pid = %self.pid, "Waiting for bootstrap process to exit");

        loop {
            match waitpid(self.pid.as_nix_pid(), None) {
                Ok(WaitStatus::Exited(_, exit_code)) => {
                    debug!(exit_code, "Bootstrap process exited");
                    return Ok(ExitOutcome::Exited(exit_code));
                }
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    warn!(signal = ?signal, "Bootstrap process terminated by signal");
                    return Ok(ExitOutcome::Signaled(signal as i32));
                }
                Ok(status) => {
                    debug!(status = ?status, "Bootstrap process changed state");
                    // Continue waiting for exit
                }
                Err(nix::errno::Errno::EINTR) => {
                    debug!("Wait interrupted by signal, continuing...");
                }
                Err(e) => {
                    error!(error = %e, "Wait failed");
                    return Err(Error::System(e));
                }
            }
        }
    }
}
