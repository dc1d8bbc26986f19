//! Enclave Core - Foundation types and the error taxonomy
//!
//! This crate provides the types shared by the launcher, the bootstrapper
//! and the command-line front end.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod types;

pub use error::{Error, Result, SetupStep};
pub use types::{ExitOutcome, InvocationSpec, ProcessId};
