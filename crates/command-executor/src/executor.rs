//! Main executor type that wraps different backends

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::backend::Backend;
use crate::backends::LocalBackend;
use crate::command::Command;
use crate::error::Result;
use crate::process::CommandOutput;

/// Timeout applied to commands that do not carry their own
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// An executor that runs commands via a specific backend
///
/// Cloning is cheap; clones share the backend.
#[derive(Clone)]
pub struct Executor {
    /// The service name for logging/identification
    service_name: String,
    /// The backend implementation
    backend: Arc<dyn Backend>,
    /// Timeout for commands without one
    default_timeout: Duration,
}

impl Executor {
    /// Create a new executor with the given backend
    pub fn new(service_name: impl Into<String>, backend: impl Backend) -> Self {
        Self::from_shared(service_name, Arc::new(backend))
    }

    /// Create an executor over a backend that is shared with other owners
    pub fn from_shared(service_name: impl Into<String>, backend: Arc<dyn Backend>) -> Self {
        Self {
            service_name: service_name.into(),
            backend,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create an executor that runs commands on the local host
    pub fn local(service_name: impl Into<String>) -> Self {
        Self::new(service_name, LocalBackend)
    }

    /// Override the timeout used for commands without their own
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Run a command and return its output whatever the exit code
    pub async fn output(&self, mut command: Command) -> Result<CommandOutput> {
        if command.get_timeout().is_none() {
            command.timeout(self.default_timeout);
        }
        debug!(service = %self.service_name, "Running `{}`", command);
        let output = self.backend.execute(&command).await?;
        debug!(
            service = %self.service_name,
            code = ?output.status.code,
            "`{}` finished",
            command
        );
        Ok(output)
    }

    /// Run a command, treating a non-zero exit as an error
    pub async fn run(&self, command: Command) -> Result<CommandOutput> {
        let output = self.output(command.clone()).await?;
        output.into_success(&command)
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("service_name", &self.service_name)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}
