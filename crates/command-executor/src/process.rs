//! Exit status and captured output of finished commands

use crate::command::Command;
use crate::error::{Error, Result};

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code if the process exited normally
    pub code: Option<i32>,
    /// Signal that terminated the process (Unix only)
    #[cfg(unix)]
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// An exit status with the given code
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            #[cfg(unix)]
            signal: None,
        }
    }

    /// Returns true if the process exited successfully (code 0)
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            Self {
                code: status.code(),
                signal: status.signal(),
            }
        }
        #[cfg(not(unix))]
        {
            Self {
                code: status.code(),
            }
        }
    }
}

/// Everything a finished command produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// How the process exited
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8)
    pub stdout: String,
    /// Captured standard error (lossy UTF-8)
    pub stderr: String,
}

impl CommandOutput {
    /// A successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: ExitStatus::from_code(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed output with the given exit code and stderr
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: ExitStatus::from_code(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the command exited with code 0
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Turn an unsuccessful exit into [`Error::NonZeroExit`]
    pub fn into_success(self, command: &Command) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::NonZeroExit {
                command: command.to_string(),
                code: self.status.code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_success_keeps_stdout() {
        let cmd = Command::new("opened-ports");
        let output = CommandOutput::ok("8080/tcp\n").into_success(&cmd).unwrap();
        assert_eq!(output.stdout, "8080/tcp\n");
    }

    #[test]
    fn test_into_success_reports_stderr() {
        let cmd = Command::builder("snap").arg("install").arg("nope").build();
        let err = CommandOutput::failed(1, "error: snap \"nope\" not found\n")
            .into_success(&cmd)
            .unwrap_err();

        match err {
            Error::NonZeroExit {
                command,
                code,
                stderr,
            } => {
                assert_eq!(command, "snap install nope");
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "error: snap \"nope\" not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
