//! Configuration for the unit agent.
//!
//! Two layers feed a reconciliation pass:
//!
//! - [`CharmConfig`]: the operator-facing options (`port`, `host`, `channel`)
//!   read from the platform on every event and turned into a [`DesiredState`].
//! - [`AgentSettings`]: deployment constants (package name, systemd unit,
//!   relation endpoint, timeouts) loaded from an optional YAML file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Port the service listens on when the operator has not set one
pub const DEFAULT_PORT: u16 = 8080;

/// Address the service binds to when the operator has not set one
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Failed to parse JSON
    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// The platform could not supply a value
    #[error("Configuration unavailable: {0}")]
    Unavailable(String),
}

/// Operator-facing options as reported by `config-get --format=json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CharmConfig {
    /// Port the service listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address the service binds to
    #[serde(default = "default_host")]
    pub host: String,

    /// Package channel override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

impl Default for CharmConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: DEFAULT_HOST.to_string(),
            channel: None,
        }
    }
}

impl CharmConfig {
    /// Parse the JSON document printed by `config-get --format=json`
    ///
    /// Unknown options are ignored; missing ones take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(json)?;
        if config.port == 0 {
            return Err(ConfigError::ValidationError(
                "port must be between 1 and 65535".to_string(),
            ));
        }
        Ok(config)
    }
}

/// What one reconciliation pass converges the host towards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    /// Port the service must listen on and the firewall must expose
    pub port: u16,
    /// Address the service must bind to
    pub bind_address: String,
    /// Release track the package is installed from
    pub package_channel: String,
}

impl DesiredState {
    /// Combine operator options with agent defaults
    pub fn resolve(config: &CharmConfig, settings: &AgentSettings) -> Self {
        Self {
            port: config.port,
            bind_address: config.host.clone(),
            package_channel: config
                .channel
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| settings.default_channel.clone()),
        }
    }

    /// Returns true when the bind address listens on every interface
    pub fn binds_all_interfaces(&self) -> bool {
        matches!(self.bind_address.trim(), "" | "0.0.0.0" | "::" | "[::]")
    }
}

/// Deployment constants for the managed service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentSettings {
    /// Name of the snap to manage
    pub package: String,

    /// systemd unit that runs the snap's daemon
    pub service_unit: String,

    /// Relation endpoint consumers join to receive the service endpoint
    pub relation: String,

    /// Channel used when the operator has not chosen one
    pub default_channel: String,

    /// Load-balancer options published with the endpoint
    pub service_options: Vec<String>,

    /// Timeout for ordinary host commands, in seconds
    pub command_timeout: u64,

    /// Timeout for package installs and refreshes, in seconds
    pub install_timeout: u64,

    /// Timeout for one health probe request, in seconds
    pub probe_timeout: u64,

    /// How long to wait for the service to report running after an upgrade, in seconds
    pub running_wait: u64,

    /// Delay between running-state polls, in milliseconds
    pub running_poll_interval_ms: u64,

    /// Default log filter when `RUST_LOG` is unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            package: "microsample".to_string(),
            service_unit: "snap.microsample.microsample.service".to_string(),
            relation: "website".to_string(),
            default_channel: "edge".to_string(),
            service_options: vec![
                "mode http".to_string(),
                "balance leastconn".to_string(),
                "http-check expect rstring ^Online$".to_string(),
            ],
            command_timeout: 60,
            install_timeout: 300,
            probe_timeout: 10,
            running_wait: 60,
            running_poll_interval_ms: 1000,
            log_level: None,
        }
    }
}

impl AgentSettings {
    /// Parse settings from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let settings: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a YAML file, falling back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_yaml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Reject settings that cannot drive a reconciliation pass
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("package", &self.package),
            ("service_unit", &self.service_unit),
            ("relation", &self.relation),
            ("default_channel", &self.default_channel),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{} must not be empty",
                    name
                )));
            }
        }
        for (name, value) in [
            ("command_timeout", self.command_timeout),
            ("install_timeout", self.install_timeout),
            ("probe_timeout", self.probe_timeout),
            ("running_wait", self.running_wait),
            ("running_poll_interval_ms", self.running_poll_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Timeout for ordinary host commands
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout)
    }

    /// Timeout for package installs and refreshes
    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout)
    }

    /// Timeout for one health probe
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout)
    }

    /// Upper bound on waiting for the service to run
    pub fn running_wait(&self) -> Duration {
        Duration::from_secs(self.running_wait)
    }

    /// Delay between running-state polls
    pub fn running_poll_interval(&self) -> Duration {
        Duration::from_millis(self.running_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_charm_config_defaults() {
        let config = CharmConfig::from_json("{}").unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.channel, None);

        assert_eq!(CharmConfig::from_json("").unwrap(), CharmConfig::default());
    }

    #[test]
    fn test_charm_config_ignores_unknown_options() {
        let config =
            CharmConfig::from_json(r#"{"port": 9090, "host": "10.0.0.5", "debug": true}"#).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.host, "10.0.0.5");
    }

    #[test]
    fn test_charm_config_rejects_bad_port() {
        assert!(matches!(
            CharmConfig::from_json(r#"{"port": 0}"#),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            CharmConfig::from_json(r#"{"port": 70000}"#),
            Err(ConfigError::JsonError(_))
        ));
    }

    #[test]
    fn test_desired_state_channel_fallback() {
        let settings = AgentSettings::default();

        let desired = DesiredState::resolve(&CharmConfig::default(), &settings);
        assert_eq!(desired.package_channel, "edge");
        assert!(desired.binds_all_interfaces());

        let config = CharmConfig {
            port: 9090,
            host: "192.168.1.10".to_string(),
            channel: Some("stable".to_string()),
        };
        let desired = DesiredState::resolve(&config, &settings);
        assert_eq!(desired.port, 9090);
        assert_eq!(desired.package_channel, "stable");
        assert!(!desired.binds_all_interfaces());
    }

    #[test]
    fn test_settings_partial_yaml() {
        let settings = AgentSettings::from_yaml_str(
            r#"
relation: http
install_timeout: 600
log_level: debug
"#,
        )
        .unwrap();

        assert_eq!(settings.relation, "http");
        assert_eq!(settings.install_timeout(), Duration::from_secs(600));
        assert_eq!(settings.package, "microsample");
        assert_eq!(settings.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_settings_validation() {
        assert!(matches!(
            AgentSettings::from_yaml_str("package: ''"),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            AgentSettings::from_yaml_str("probe_timeout: 0"),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            AgentSettings::from_yaml_str("relation: [a, b]"),
            Err(ConfigError::YamlError(_))
        ));
    }

    #[test]
    fn test_settings_load_or_default() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("lifecycle.yaml");
        assert_eq!(
            AgentSettings::load_or_default(&missing).unwrap(),
            AgentSettings::default()
        );

        let mut file = std::fs::File::create(&missing).unwrap();
        writeln!(file, "default_channel: beta").unwrap();
        let settings = AgentSettings::load_or_default(&missing).unwrap();
        assert_eq!(settings.default_channel, "beta");
    }
}
