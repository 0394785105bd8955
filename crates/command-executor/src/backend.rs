//! Backend trait for different execution contexts

use crate::command::Command;
use crate::error::Result;
use crate::process::CommandOutput;
use async_trait::async_trait;

/// A backend that can run commands to completion
///
/// Implementations must honour [`Command::get_timeout`] when it is set; the
/// [`Executor`](crate::Executor) always fills it in before calling the backend.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Run the command and capture its output, whatever its exit code
    async fn execute(&self, command: &Command) -> Result<CommandOutput>;
}
