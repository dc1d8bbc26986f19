//! Namespace identity inspection through `/proc/<pid>/ns`

use std::fs;

use enclave_core::{Error, ProcessId, Result};

/// Namespace ids of one process, as read from `/proc/<pid>/ns/*`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceInfo {
    /// PID namespace ID
    pub pid: Option<String>,
    /// Mount namespace ID
    pub mnt: Option<String>,
    /// UTS namespace ID
    pub uts: Option<String>,
}

impl NamespaceInfo {
    /// Namespaces of the calling process
    ///
    /// # Errors
    /// Returns error if `/proc/self/ns` cannot be read
    pub fn current() -> Result<Self> {
        Self::for_pid(ProcessId::current())
    }

    /// Namespaces of the given process
    ///
    /// # Errors
    /// Returns error if the process has no readable `ns` directory
    pub fn for_pid(pid: ProcessId) -> Result<Self> {
        let base_path = format!("/proc/{pid}/ns");

        let read_ns = |name: &str| -> Result<String> {
            let path = format!("{base_path}/{name}");
            fs::read_link(&path)
                .map(|p| p.to_string_lossy().into_owned())
                .map_err(|e| Error::Io(std::io::Error::new(e.kind(), format!("{path}: {e}"))))
        };

        // The pid link is always present; use it to tell a missing process apart
        let pid_ns = read_ns("pid")?;

        Ok(Self {
            pid: Some(pid_ns),
            mnt: read_ns("mnt").ok(),
            uts: read_ns("uts").ok(),
        })
    }

    /// True when every namespace kind differs from `other`
    #[must_use]
    pub fn isolated_from(&self, other: &Self) -> bool {
        differs(self.pid.as_ref(), other.pid.as_ref())
            && differs(self.mnt.as_ref(), other.mnt.as_ref())
            && differs(self.uts.as_ref(), other.uts.as_ref())
    }
}

fn differs(a: Option<&String>, b: Option<&String>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a != b)
}

impl std::fmt::Display for NamespaceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "pid={} mnt={} uts={}",
            field(&self.pid),
            field(&self.mnt),
            field(&self.uts)
        )
    }
}
