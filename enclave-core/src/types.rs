//! Core type definitions with strong typing and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use nix::sys::signal::Signal;

use crate::{Error, Result};

/// Target command and its parameters, passed unchanged through both phases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationSpec {
    program: String,
    params: Vec<String>,
}

impl InvocationSpec {
    /// Create a new `InvocationSpec` with validation
    ///
    /// # Errors
    /// Returns [`Error::InvalidInvocation`] if the program name is empty
    pub fn new(program: impl Into<String>, params: Vec<String>) -> Result<Self> {
        let program = program.into();
        if program.is_empty() {
            return Err(Error::invalid_invocation("target command cannot be empty"));
        }
        if program.contains('\0') || params.iter().any(|p| p.contains('\0')) {
            return Err(Error::invalid_invocation(
                "arguments cannot contain NUL bytes",
            ));
        }

        Ok(Self { program, params })
    }

    /// Split an argument vector into program and parameters
    ///
    /// # Errors
    /// Returns [`Error::InvalidInvocation`] if `argv` is empty or starts with an empty string
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        match argv.split_first() {
            Some((program, params)) => Self::new(program.clone(), params.to_vec()),
            None => Err(Error::invalid_invocation("no target command given")),
        }
    }

    /// Target program name or path
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Parameters passed to the target program
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Program followed by its parameters
    #[must_use]
    pub fn to_argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.params.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.params.iter().cloned());
        argv
    }
}

impl fmt::Display for InvocationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for param in &self.params {
            write!(f, " {param}")?;
        }
        Ok(())
    }
}

/// How a process terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ExitOutcome {
    /// Normal exit with a status code
    Exited(i32),
    /// Terminated by the given signal number
    Signaled(i32),
}

impl ExitOutcome {
    /// Successful exit
    pub const SUCCESS: Self = Self::Exited(0);

    /// Whether the process exited with status 0
    #[must_use]
    pub const fn success(self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Exit code to report for this outcome
    ///
    /// Signal terminations use the shell convention of `128 + signal`.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Exited(code) => code,
            Self::Signaled(signal) => 128 + signal,
        }
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => Self::Exited(code),
            (None, Some(signal)) => Self::Signaled(signal),
            (None, None) => Self::Exited(1),
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signaled(signal) => match Signal::try_from(signal) {
                Ok(sig) => write!(f, "terminated by {sig}"),
                Err(_) => write!(f, "terminated by signal {signal}"),
            },
        }
    }
}

/// Process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ProcessId(i32);

impl ProcessId {
    /// Create from raw PID
    #[must_use]
    pub const fn from_raw(pid: i32) -> Self {
        Self(pid)
    }

    /// Get the current process ID
    #[must_use]
    pub fn current() -> Self {
        Self::from(nix::unistd::getpid())
    }

    /// Convert to `nix::unistd::Pid`
    #[must_use]
    pub const fn as_nix_pid(self) -> nix::unistd::Pid {
        nix::unistd::Pid::from_raw(self.0)
    }

    /// Get raw PID value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<nix::unistd::Pid> for ProcessId {
    fn from(pid: nix::unistd::Pid) -> Self {
        Self(pid.as_raw())
    }
}

impl From<ProcessId> for nix::unistd::Pid {
    fn from(pid: ProcessId) -> Self {
        Self::from_raw(pid.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_validation() {
        assert!(InvocationSpec::new("echo", vec!["hello".to_string()]).is_ok());
        assert!(InvocationSpec::new("", Vec::new()).is_err());
        assert!(InvocationSpec::new("echo", vec!["a\0b".to_string()]).is_err());
    }

    #[test]
    fn test_invocation_from_argv() {
        let argv = vec!["/bin/ls".to_string(), "-la".to_string(), "/".to_string()];
        let spec = InvocationSpec::from_argv(&argv).unwrap();

        assert_eq!(spec.program(), "/bin/ls");
        assert_eq!(spec.params(), ["-la", "/"]);
        assert_eq!(spec.to_argv(), argv);
    }

    #[test]
    fn test_invocation_from_empty_argv() {
        let err = InvocationSpec::from_argv(&[]).unwrap_err();
        assert!(matches!(err, Error::InvalidInvocation { .. }));
    }

    #[test]
    fn test_exit_outcome_codes() {
        assert!(ExitOutcome::SUCCESS.success());
        assert_eq!(ExitOutcome::Exited(3).code(), 3);
        assert!(!ExitOutcome::Exited(3).success());
        assert_eq!(ExitOutcome::Signaled(9).code(), 137);
    }

    #[test]
    fn test_exit_outcome_from_status() {
        // Raw wait status: exit code lives in the second byte, signal in the low bits
        assert_eq!(
            ExitOutcome::from(ExitStatus::from_raw(1 << 8)),
            ExitOutcome::Exited(1)
        );
        assert_eq!(
            ExitOutcome::from(ExitStatus::from_raw(15)),
            ExitOutcome::Signaled(15)
        );
    }

    #[test]
    fn test_exit_outcome_display() {
        assert_eq!(ExitOutcome::Exited(0).to_string(), "exited with code 0");
        assert_eq!(ExitOutcome::Signaled(9).to_string(), "terminated by SIGKILL");
    }

    #[test]
    fn test_process_id() {
        let pid = ProcessId::from_raw(123);
        assert_eq!(pid.as_raw(), 123);

        let nix_pid = pid.as_nix_pid();
        assert_eq!(nix_pid.as_raw(), 123);
    }
}
