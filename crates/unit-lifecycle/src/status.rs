//! Unit status as reported to the platform, and the service's runtime state.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message reported while the service is stopped
pub const STOPPED_MESSAGE: &str = "Service stopped.";

/// Observable lifecycle status of the unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitStatus {
    /// Package installation in progress
    Installing(String),
    /// Settings, firewall or service being reconciled
    Configuring(String),
    /// Service running, with an optional message
    Active(Option<String>),
    /// Operator attention required
    Blocked(String),
    /// Service intentionally stopped
    Stopped,
}

impl UnitStatus {
    /// Status name understood by `status-set`
    pub fn name(&self) -> &'static str {
        match self {
            UnitStatus::Installing(_) | UnitStatus::Configuring(_) | UnitStatus::Stopped => {
                "maintenance"
            }
            UnitStatus::Active(_) => "active",
            UnitStatus::Blocked(_) => "blocked",
        }
    }

    /// Message shown next to the status name
    pub fn message(&self) -> &str {
        match self {
            UnitStatus::Installing(msg)
            | UnitStatus::Configuring(msg)
            | UnitStatus::Blocked(msg) => msg.as_str(),
            UnitStatus::Active(msg) => msg.as_deref().unwrap_or(""),
            UnitStatus::Stopped => STOPPED_MESSAGE,
        }
    }

    /// True for [`UnitStatus::Blocked`]
    pub fn is_blocked(&self) -> bool {
        matches!(self, UnitStatus::Blocked(_))
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message().is_empty() {
            f.write_str(self.name())
        } else {
            write!(f, "{}: {}", self.name(), self.message())
        }
    }
}

/// Sink for the unit's externally visible status
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Replace the unit status
    async fn set_status(&self, status: &UnitStatus) -> Result<()>;

    /// Publish the running application's version
    async fn set_application_version(&self, version: &str) -> Result<()>;
}

/// What the agent last observed about the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRuntimeState {
    /// Whether the service was last seen running
    pub running: bool,
    /// When the last health probe ran
    pub last_health_check: Option<DateTime<Utc>>,
    /// Most recent failure, cleared on success
    pub last_error: Option<String>,
}

impl ServiceRuntimeState {
    /// Record a service control outcome
    pub fn record_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Record a probe outcome
    pub fn record_probe(&mut self, error: Option<String>) {
        self.last_health_check = Some(Utc::now());
        self.running = error.is_none();
        self.last_error = error;
    }

    /// Record a failed step
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }
}
