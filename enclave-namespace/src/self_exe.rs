//! Locating the binary to re-execute for the bootstrap phase

use std::path::{Path, PathBuf};

use enclave_core::{Error, Result};

/// Path of the running executable as exposed by procfs
pub const PROC_SELF_EXE: &str = "/proc/self/exe";

/// Something that yields a path which, when executed, runs this same program
pub trait SelfExecutable {
    /// Path to exec for the bootstrap phase
    ///
    /// # Errors
    /// Returns error if no usable executable can be found
    fn executable(&self) -> Result<PathBuf>;
}

/// Re-executes the running image through `/proc/self/exe`
///
/// The link is resolved by the kernel at exec time, so the bootstrap phase
/// runs the exact binary the launcher was started from even if it has since
/// been replaced or is not on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcSelfExe;

impl SelfExecutable for ProcSelfExe {
    fn executable(&self) -> Result<PathBuf> {
        let path = Path::new(PROC_SELF_EXE);
        if !path.exists() {
            return Err(Error::invalid_config(format!(
                "{PROC_SELF_EXE} is not available (is procfs mounted?)"
            )));
        }
        Ok(path.to_path_buf())
    }
}

/// An explicitly installed binary, for hosts without a usable `/proc/self/exe`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledBinary(PathBuf);

impl InstalledBinary {
    /// Wrap the path of an installed `enclave` binary
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Configured path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl SelfExecutable for InstalledBinary {
    fn executable(&self) -> Result<PathBuf> {
        if !self.0.is_absolute() {
            return Err(Error::invalid_config(format!(
                "installed binary path must be absolute, got '{}'",
                self.0.display()
            )));
        }
        if !self.0.is_file() {
            return Err(Error::invalid_config(format!(
                "installed binary '{}' does not exist",
                self.0.display()
            )));
        }
        Ok(self.0.clone())
    }
}
