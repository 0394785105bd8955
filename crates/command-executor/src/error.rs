//! Error types for command execution

use std::time::Duration;
use thiserror::Error;

/// Unified error type for command execution
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to spawn a process
    #[error("failed to spawn process: {reason}")]
    SpawnFailed {
        /// The reason for the spawn failure
        reason: String,
    },

    /// Command not found
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The command that was not found
        command: String,
    },

    /// Command did not finish within its timeout and was killed
    #[error("`{command}` timed out after {timeout:?}")]
    TimedOut {
        /// The command line that timed out
        command: String,
        /// The timeout that was exceeded
        timeout: Duration,
    },

    /// Command ran but exited unsuccessfully
    #[error("`{command}` exited with {code:?}: {stderr}")]
    NonZeroExit {
        /// The command line that failed
        command: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Trimmed standard error of the process
        stderr: String,
    },

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a spawn failed error
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Returns true if this error was caused by a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::TimedOut { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
