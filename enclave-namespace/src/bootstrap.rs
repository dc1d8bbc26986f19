//! Bootstrap phase: finish isolation from inside the new namespaces
//!
//! Runs as the re-executed child, already PID 1 of its PID namespace.
//! Setup is strictly ordered and fail-fast:
//!
//! ```text
//! Start → HostnameSet → RootChanged → DirChanged → ProcMounted → Running → ProcUnmounted → Exited
//! ```
//!
//! A failing setup step jumps straight to `Exited`. Once the target is
//! running, proc is always unmounted before exiting.

use std::path::Path;
use std::process::Command;

use enclave_core::{Error, ExitOutcome, InvocationSpec, ProcessId, Result, SetupStep};
use nix::mount::{MntFlags, MsFlags, mount, umount2};
use nix::unistd::{chdir, chroot, sethostname};
use tracing::{debug, info, warn};

use crate::config::IsolationConfig;

/// Bootstrapper lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    /// Nothing applied yet
    Start,
    /// Hostname set inside the UTS namespace
    HostnameSet,
    /// Filesystem root changed
    RootChanged,
    /// Working directory moved to the new root
    DirChanged,
    /// Proc filesystem mounted
    ProcMounted,
    /// Target command running
    Running,
    /// Proc filesystem unmounted (or unmount attempted)
    ProcUnmounted,
    /// Terminal state
    Exited,
}

/// OS operations the bootstrapper performs, in the order it performs them
pub trait IsolationOps {
    /// Whether the process runs inside namespaces created by the launcher
    ///
    /// Checked before any setup step; a `false` here means the setup would
    /// rename, mount over and chroot the host instead.
    fn in_isolated_namespace(&self) -> bool;

    /// Set the hostname of the current UTS namespace
    ///
    /// # Errors
    /// Returns error if the kernel rejects the hostname
    fn set_hostname(&mut self, hostname: &str) -> Result<()>;

    /// Change the filesystem root
    ///
    /// # Errors
    /// Returns error if `chroot(2)` fails
    fn change_root(&mut self, root: &Path) -> Result<()>;

    /// Change the working directory
    ///
    /// # Errors
    /// Returns error if `chdir(2)` fails
    fn change_dir(&mut self, dir: &Path) -> Result<()>;

    /// Mount the proc filesystem at `target`
    ///
    /// # Errors
    /// Returns error if `mount(2)` fails
    fn mount_proc(&mut self, target: &Path) -> Result<()>;

    /// Unmount the proc filesystem at `target`
    ///
    /// # Errors
    /// Returns error if `umount2(2)` fails
    fn unmount_proc(&mut self, target: &Path) -> Result<()>;

    /// Run the target command to completion with inherited standard streams
    ///
    /// # Errors
    /// Returns [`Error::TargetExecution`] if the command cannot be started
    fn run_target(&mut self, invocation: &InvocationSpec) -> Result<ExitOutcome>;
}

/// [`IsolationOps`] backed by the real system calls
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOps;

impl IsolationOps for SystemOps {
    fn in_isolated_namespace(&self) -> bool {
        // The launcher clones with CLONE_NEWPID, so the bootstrap process is PID 1
        ProcessId::current().as_raw() == 1
    }

    fn set_hostname(&mut self, hostname: &str) -> Result<()> {
        sethostname(hostname)?;
        Ok(())
    }

    fn change_root(&mut self, root: &Path) -> Result<()> {
        chroot(root)?;
        Ok(())
    }

    fn change_dir(&mut self, dir: &Path) -> Result<()> {
        chdir(dir)?;
        Ok(())
    }

    fn mount_proc(&mut self, target: &Path) -> Result<()> {
        // MS_NOSUID | MS_NODEV | MS_NOEXEC for security
        let flags = MsFlags::MS_NOSUID | MsFlags::MS_NODEV | MsFlags::MS_NOEXEC;
        mount(Some("proc"), target, Some("proc"), flags, None::<&str>)?;
        Ok(())
    }

    fn unmount_proc(&mut self, target: &Path) -> Result<()> {
        umount2(target, MntFlags::MNT_DETACH)?;
        Ok(())
    }

    fn run_target(&mut self, invocation: &InvocationSpec) -> Result<ExitOutcome> {
        let status = Command::new(invocation.program())
            .args(invocation.params())
            .status()
            .map_err(|source| Error::TargetExecution {
                program: invocation.program().to_string(),
                source,
            })?;

        Ok(ExitOutcome::from(status))
    }
}

/// Applies an [`IsolationConfig`] and runs the target command
#[derive(Debug)]
pub struct Bootstrapper<O = SystemOps> {
    context: IsolationConfig,
    ops: O,
    state: BootstrapState,
}

impl Bootstrapper<SystemOps> {
    /// Create a bootstrapper that issues real system calls
    #[must_use]
    pub const fn new(context: IsolationConfig) -> Self {
        Self::with_ops(context, SystemOps)
    }
}

impl<O: IsolationOps> Bootstrapper<O> {
    /// Create a bootstrapper over a custom set of operations
    #[must_use]
    pub const fn with_ops(context: IsolationConfig, ops: O) -> Self {
        Self {
            context,
            ops,
            state: BootstrapState::Start,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> BootstrapState {
        self.state
    }

    /// Get the isolation context
    #[must_use]
    pub const fn context(&self) -> &IsolationConfig {
        &self.context
    }

    /// Get the underlying operations
    #[must_use]
    pub const fn ops(&self) -> &O {
        &self.ops
    }

    /// Isolate, run the target, then unmount proc
    ///
    /// Returns the target's own outcome, whatever it is.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInvocation`] when not running inside the
    /// launcher's namespaces, [`Error::IsolationSetup`] if any setup step
    /// fails (the target never runs), or [`Error::TargetExecution`] if the
    /// target cannot be started.
    pub fn run(&mut self, invocation: &InvocationSpec) -> Result<ExitOutcome> {
        if self.state != BootstrapState::Start {
            return Err(Error::invalid_invocation("bootstrapper has already run"));
        }

        if !self.ops.in_isolated_namespace() {
            self.state = BootstrapState::Exited;
            return Err(Error::invalid_invocation(format!(
                "'{}' must be started by the launcher, not run directly",
                crate::launcher::BOOTSTRAP_COMMAND
            )));
        }

        info!(
            pid = %ProcessId::current(),
            command = %invocation,
            "Bootstrapping isolated environment"
        );

        self.step(SetupStep::Hostname, BootstrapState::HostnameSet, |ops, ctx| {
            ops.set_hostname(&ctx.hostname)
        })?;
        self.step(SetupStep::Chroot, BootstrapState::RootChanged, |ops, ctx| {
            ops.change_root(&ctx.rootfs)
        })?;
        // After chroot, so "/" resolves inside the new root
        self.step(SetupStep::Chdir, BootstrapState::DirChanged, |ops, _| {
            ops.change_dir(Path::new("/"))
        })?;
        self.step(SetupStep::MountProc, BootstrapState::ProcMounted, |ops, ctx| {
            ops.mount_proc(&ctx.proc_mount)
        })?;

        self.state = BootstrapState::Running;
        debug!(command = %invocation, "Running target command");
        let result = self.ops.run_target(invocation);

        self.cleanup();
        self.state = BootstrapState::Exited;

        if let Ok(outcome) = &result {
            debug!(outcome = %outcome, "Target command finished");
        }
        result
    }

    /// Fail-fast wrapper for one setup step
    fn step<F>(&mut self, step: SetupStep, next: BootstrapState, apply: F) -> Result<()>
    where
        F: FnOnce(&mut O, &IsolationConfig) -> Result<()>,
    {
        debug!(step = %step, "Applying setup step");

        match apply(&mut self.ops, &self.context) {
            Ok(()) => {
                self.state = next;
                Ok(())
            }
            Err(e) => {
                self.state = BootstrapState::Exited;
                let message = match e {
                    Error::System(errno) => errno.desc().to_string(),
                    other => other.to_string(),
                };
                Err(Error::IsolationSetup { step, message })
            }
        }
    }

    /// Best-effort unmount; failures are logged, never returned
    fn cleanup(&mut self) {
        if let Err(e) = self.ops.unmount_proc(&self.context.proc_mount) {
            let err = Error::Cleanup {
                message: format!("unmount {}: {e}", self.context.proc_mount.display()),
            };
            warn!(error = %err, "Leaving proc mounted");
        }
        self.state = BootstrapState::ProcUnmounted;
    }
}
