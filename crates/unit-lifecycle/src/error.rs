//! Error types for unit lifecycle operations

use crate::config::ConfigError;
use thiserror::Error;

/// Malformed output from a host collaborator
///
/// Collaborator output is parsed strictly: an unexpected shape is reported
/// rather than guessed around.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A listing row had the wrong number of whitespace-separated fields
    #[error("expected {expected} fields but found {found} in line {line:?}")]
    FieldCount {
        /// The offending line
        line: String,
        /// Number of fields the format defines
        expected: usize,
        /// Number of fields actually present
        found: usize,
    },

    /// A listing did not start with the expected header
    #[error("unexpected header line {0:?}")]
    Header(String),

    /// A port specification could not be understood
    #[error("invalid port specification {0:?}")]
    PortSpec(String),

    /// A JSON document could not be decoded
    #[error("invalid JSON from {tool}: {reason}")]
    Json {
        /// Tool that produced the document
        tool: String,
        /// Decoder message
        reason: String,
    },

    /// A YAML blob could not be decoded
    #[error("invalid YAML in {key}: {reason}")]
    Yaml {
        /// Key the blob was stored under
        key: String,
        /// Decoder message
        reason: String,
    },
}

/// Error types for lifecycle operations
#[derive(Error, Debug)]
pub enum Error {
    /// The package is not installed
    #[error("package {0} is not installed")]
    NotInstalled(String),

    /// More than one variant of the package is installed
    #[error("ambiguous install state for {package}: found {}", found.join(", "))]
    AmbiguousInstallState {
        /// Package that was queried
        package: String,
        /// Every installed variant that matched
        found: Vec<String>,
    },

    /// Installing or refreshing the package failed
    #[error("install failed: {0}")]
    InstallFailed(#[source] command_executor::Error),

    /// Writing package settings failed
    #[error("config write failed: {0}")]
    ConfigWriteFailed(#[source] command_executor::Error),

    /// A firewall hook tool failed
    #[error("firewall command failed: {0}")]
    FirewallCommandFailed(#[source] command_executor::Error),

    /// A service manager command failed or the service did not come up
    #[error("service control failed: {0}")]
    ServiceControlFailed(String),

    /// The service endpoint did not answer healthily
    #[error("application not responding at {url}: {reason}")]
    HealthCheckFailed {
        /// URL that was probed
        url: String,
        /// Why the probe was considered unhealthy
        reason: String,
    },

    /// Writing to the relation registry failed
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// Collaborator output had an unexpected shape
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Agent configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The hook name does not map to any known event
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Reporting status to the platform failed
    #[error("status report failed: {0}")]
    StatusReport(#[source] command_executor::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
