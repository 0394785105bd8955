//! Pushes the desired listen address and port into the snap's own settings.

use crate::config::DesiredState;
use crate::error::{Error, Result};
use command_executor::{Command, Executor};
use tracing::info;

/// Writes runtime parameters with `snap set`
///
/// Writing never restarts the service; the orchestrator sequences restarts
/// against firewall changes.
#[derive(Debug, Clone)]
pub struct SnapSettings {
    executor: Executor,
    package: String,
}

impl SnapSettings {
    /// Create a settings writer for the named snap
    pub fn new(executor: Executor, package: impl Into<String>) -> Self {
        Self {
            executor,
            package: package.into(),
        }
    }

    /// Write `port` and `address` from the desired state
    pub async fn apply(&self, desired: &DesiredState) -> Result<()> {
        let cmd = Command::builder("snap")
            .arg("set")
            .arg(&self.package)
            .arg(format!("port={}", desired.port))
            .arg(format!("address={}", desired.bind_address))
            .build();

        self.executor
            .run(cmd)
            .await
            .map_err(Error::ConfigWriteFailed)?;

        info!(
            "Configured {} to listen on {}:{}",
            self.package, desired.bind_address, desired.port
        );
        Ok(())
    }
}
