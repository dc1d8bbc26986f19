//! Namespace and isolation configuration

use std::path::{Path, PathBuf};

use enclave_core::{Error, Result};
use nix::sched::CloneFlags;
use serde::{Deserialize, Serialize};

/// Hostname used inside the UTS namespace when none is configured
pub const DEFAULT_HOSTNAME: &str = "enclave";

/// Default mount point for the proc filesystem, relative to the new root
pub const DEFAULT_PROC_MOUNT: &str = "/proc";

/// Longest hostname the kernel accepts (`HOST_NAME_MAX`)
pub const MAX_HOSTNAME_LENGTH: usize = 64;

/// Namespaces requested for the bootstrap process
///
/// Only meaningful at process creation: the flags are handed to `clone(2)`
/// and cannot be applied to a process that is already running.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// Enable UTS namespace (hostname)
    pub uts: bool,

    /// Enable PID namespace
    pub pid: bool,

    /// Enable mount namespace
    pub mount: bool,

    /// Stop mount events propagating between the new mount namespace and the host
    pub private_mounts: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self::isolated()
    }
}

impl NamespaceConfig {
    /// UTS + PID + mount namespaces with private mount propagation
    #[must_use]
    pub const fn isolated() -> Self {
        Self {
            uts: true,
            pid: true,
            mount: true,
            private_mounts: true,
        }
    }

    /// Convert to clone flags for clone(2)
    #[must_use]
    pub fn to_clone_flags(&self) -> CloneFlags {
        let mut flags = CloneFlags::empty();

        if self.uts {
            flags |= CloneFlags::CLONE_NEWUTS;
        }
        if self.pid {
            flags |= CloneFlags::CLONE_NEWPID;
        }
        if self.mount {
            flags |= CloneFlags::CLONE_NEWNS;
        }

        flags
    }

    /// Get list of enabled namespace names
    #[must_use]
    pub fn enabled_namespaces(&self) -> Vec<&'static str> {
        let mut namespaces = Vec::new();

        if self.uts {
            namespaces.push("uts");
        }
        if self.pid {
            namespaces.push("pid");
        }
        if self.mount {
            namespaces.push("mnt");
        }

        namespaces
    }
}

/// Parameters the bootstrapper applies from inside the new namespaces
///
/// Each field is applied exactly once, in order: hostname, root, proc mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationConfig {
    /// Hostname set inside the UTS namespace
    pub hostname: String,

    /// Pre-existing directory tree used as the new filesystem root
    pub rootfs: PathBuf,

    /// Where proc is mounted, resolved inside the new root
    pub proc_mount: PathBuf,
}

impl IsolationConfig {
    /// Create a configuration rooted at `rootfs` with default hostname and proc mount point
    #[must_use]
    pub fn new(rootfs: impl Into<PathBuf>) -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            rootfs: rootfs.into(),
            proc_mount: PathBuf::from(DEFAULT_PROC_MOUNT),
        }
    }

    /// Set hostname for the UTS namespace
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Set the proc mount point
    #[must_use]
    pub fn with_proc_mount(mut self, proc_mount: impl Into<PathBuf>) -> Self {
        self.proc_mount = proc_mount.into();
        self
    }

    /// Check the configuration before any process is created
    ///
    /// The root directory is not required to exist here; a missing root is
    /// reported by the bootstrapper when `chroot` fails.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] for a malformed hostname or a relative path
    pub fn validate(&self) -> Result<()> {
        validate_hostname(&self.hostname)?;
        require_absolute("root filesystem", &self.rootfs)?;
        require_absolute("proc mount point", &self.proc_mount)?;
        Ok(())
    }
}

fn validate_hostname(hostname: &str) -> Result<()> {
    if hostname.is_empty() {
        return Err(Error::invalid_config("hostname cannot be empty"));
    }

    if hostname.len() > MAX_HOSTNAME_LENGTH {
        return Err(Error::invalid_config(format!(
            "hostname too long (max {MAX_HOSTNAME_LENGTH} chars)"
        )));
    }

    if !hostname
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Err(Error::invalid_config(
            "hostname can only contain ASCII alphanumerics, dash and dot",
        ));
    }

    Ok(())
}

fn require_absolute(what: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::invalid_config(format!("{what} cannot be empty")));
    }
    if !path.is_absolute() {
        return Err(Error::invalid_config(format!(
            "{what} must be an absolute path, got '{}'",
            path.display()
        )));
    }
    Ok(())
}
