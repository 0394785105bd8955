//! Runtime-agnostic host command execution
//!
//! This crate runs the imperative host-level commands a unit agent depends on
//! (package manager, firewall hook tools, service manager) and returns their
//! captured output. Every command runs with a timeout; a command that exceeds
//! it is killed and reported as [`Error::TimedOut`].
//!
//! Execution is split between an [`Executor`], which applies defaults and
//! logging, and a [`Backend`], which actually runs the command. Tests swap the
//! [`LocalBackend`](backends::LocalBackend) for a scripted backend.

#![warn(missing_docs)]

pub mod backend;
pub mod backends;
pub mod command;
pub mod error;
pub mod executor;
pub mod process;

pub use backend::Backend;
pub use backends::LocalBackend;
pub use command::Command;
pub use error::{Error, Result};
pub use executor::Executor;
pub use process::{CommandOutput, ExitStatus};
