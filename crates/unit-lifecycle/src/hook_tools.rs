//! Platform hook tools outside the relation registry: status, version,
//! charm options and the unit's address.

use crate::config::{CharmConfig, ConfigError};
use crate::error::{Error, Result};
use crate::status::{StatusReporter, UnitStatus};
use async_trait::async_trait;
use command_executor::{Command, Executor};
use tracing::{debug, info};

/// Reports status through `status-set` and `application-version-set`
#[derive(Debug, Clone)]
pub struct HookToolStatus {
    executor: Executor,
}

impl HookToolStatus {
    /// Create a reporter that shells out through `executor`
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl StatusReporter for HookToolStatus {
    async fn set_status(&self, status: &UnitStatus) -> Result<()> {
        let cmd = Command::builder("status-set")
            .arg(status.name())
            .arg(status.message())
            .build();
        self.executor.run(cmd).await.map_err(Error::StatusReport)?;
        info!("Unit status: {}", status);
        Ok(())
    }

    async fn set_application_version(&self, version: &str) -> Result<()> {
        let cmd = Command::builder("application-version-set")
            .arg(version)
            .build();
        self.executor.run(cmd).await.map_err(Error::StatusReport)?;
        debug!("Application version: {}", version);
        Ok(())
    }
}

/// Current charm options from `config-get`
pub async fn fetch_charm_config(executor: &Executor) -> Result<CharmConfig> {
    let cmd = Command::builder("config-get").arg("--format=json").build();
    let output = executor
        .run(cmd)
        .await
        .map_err(|e| ConfigError::Unavailable(format!("config-get: {}", e)))?;
    Ok(CharmConfig::from_json(&output.stdout)?)
}

/// Address other units reach this one on, from `network-get`
pub async fn private_address(executor: &Executor) -> Result<String> {
    let cmd = Command::builder("network-get")
        .arg("juju-info")
        .arg("--bind-address")
        .build();
    let output = executor
        .run(cmd)
        .await
        .map_err(|e| ConfigError::Unavailable(format!("network-get: {}", e)))?;
    let address = output.stdout.trim();
    if address.is_empty() {
        return Err(
            ConfigError::Unavailable("network-get returned no bind address".to_string()).into(),
        );
    }
    Ok(address.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    #[test]
    fn test_status_set_arguments() {
        smol::block_on(async {
            let host = FakeHost::new();
            let reporter = HookToolStatus::new(host.executor());

            reporter
                .set_status(&UnitStatus::Blocked("install failed: boom".into()))
                .await
                .unwrap();
            reporter.set_status(&UnitStatus::Active(None)).await.unwrap();
            reporter.set_application_version("10.1").await.unwrap();

            assert_eq!(
                host.calls(),
                vec![
                    "status-set blocked install failed: boom".to_string(),
                    "status-set active ".to_string(),
                    "application-version-set 10.1".to_string(),
                ]
            );
        });
    }

    #[test]
    fn test_status_set_failure() {
        smol::block_on(async {
            let host = FakeHost::new().fail_on("status-set");
            let reporter = HookToolStatus::new(host.executor());

            assert!(matches!(
                reporter.set_status(&UnitStatus::Stopped).await,
                Err(Error::StatusReport(_))
            ));
        });
    }

    #[test]
    fn test_fetch_charm_config() {
        smol::block_on(async {
            let host = FakeHost::new()
                .with_output("config-get", r#"{"port": 9090, "host": "127.0.0.1"}"#);

            let config = fetch_charm_config(&host.executor()).await.unwrap();

            assert_eq!(config.port, 9090);
            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.channel, None);
        });
    }

    #[test]
    fn test_private_address() {
        smol::block_on(async {
            let host = FakeHost::new().with_output("network-get", "10.1.2.3\n");
            assert_eq!(private_address(&host.executor()).await.unwrap(), "10.1.2.3");

            let silent = FakeHost::new();
            assert!(private_address(&silent.executor()).await.is_err());
        });
    }
}
