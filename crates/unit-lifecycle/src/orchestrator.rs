//! Lifecycle orchestrator: maps each event onto an ordered sequence of
//! collaborator calls and turns the outcome into a unit status.
//!
//! Handlers never retry. A failing step ends the handler and the unit is
//! reported Blocked with `"<step> failed: <cause>"`; the platform redelivers
//! events, and every handler converges from whatever state it finds.

use crate::config::{AgentSettings, DesiredState};
use crate::context::UnitContext;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::firewall::Firewall;
use crate::health::{probe_url, HealthProbe, HealthStatus};
use crate::package::{InstalledPackageInfo, SnapPackage};
use crate::publisher::{EndpointPublisher, EndpointRecord};
use crate::registry::{RelationId, RelationRegistry};
use crate::service::ServiceController;
use crate::settings::SnapSettings;
use crate::status::{ServiceRuntimeState, StatusReporter, UnitStatus};
use command_executor::Executor;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A named step of a handler, used to attribute failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Package installation
    Install,
    /// Package refresh
    Upgrade,
    /// Writing package settings
    ApplyConfig,
    /// Firewall reconciliation
    Firewall,
    /// Service restart
    Restart,
    /// Service start
    Start,
    /// Service stop
    Stop,
    /// Waiting for the service to come up
    WaitRunning,
    /// Health probe
    HealthCheck,
    /// Endpoint publishing
    Publish,
    /// Application version reporting
    Version,
    /// Status reporting
    Report,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Install => "package install",
            Step::Upgrade => "package upgrade",
            Step::ApplyConfig => "config write",
            Step::Firewall => "firewall",
            Step::Restart => "restart",
            Step::Start => "start",
            Step::Stop => "stop",
            Step::WaitRunning => "wait for running",
            Step::HealthCheck => "health check",
            Step::Publish => "publish",
            Step::Version => "application version",
            Step::Report => "status report",
        })
    }
}

/// A collaborator error attributed to the step that raised it
#[derive(Error, Debug)]
#[error("{step} failed: {source}")]
pub struct StepError {
    /// Step that failed
    pub step: Step,
    /// Underlying error
    #[source]
    pub source: Error,
}

/// Attach a [`Step`] to a collaborator result
trait During<T> {
    fn during(self, step: Step) -> std::result::Result<T, StepError>;
}

impl<T> During<T> for Result<T> {
    fn during(self, step: Step) -> std::result::Result<T, StepError> {
        self.map_err(|source| StepError { step, source })
    }
}

type StepResult<T = Option<UnitStatus>> = std::result::Result<T, StepError>;

/// Drives one unit through its lifecycle
pub struct LifecycleOrchestrator {
    ctx: UnitContext,
    settings: AgentSettings,
    package: SnapPackage,
    config: SnapSettings,
    firewall: Firewall,
    service: ServiceController,
    publisher: EndpointPublisher,
    probe: Arc<dyn HealthProbe>,
    reporter: Arc<dyn StatusReporter>,
    runtime: ServiceRuntimeState,
    last_status: Option<UnitStatus>,
}

impl LifecycleOrchestrator {
    /// Wire the orchestrator to its collaborators
    ///
    /// Host-level adapters are built on `executor`, which gets the settings'
    /// command timeout as its default.
    pub fn new(
        ctx: UnitContext,
        settings: AgentSettings,
        executor: Executor,
        registry: Arc<dyn RelationRegistry>,
        probe: Arc<dyn HealthProbe>,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        let executor = executor.with_default_timeout(settings.command_timeout());
        Self {
            package: SnapPackage::new(
                executor.clone(),
                &settings.package,
                settings.install_timeout(),
            ),
            config: SnapSettings::new(executor.clone(), &settings.package),
            firewall: Firewall::new(executor.clone()),
            service: ServiceController::new(executor, &settings.service_unit),
            publisher: EndpointPublisher::new(registry, &settings.relation, ctx.unit.clone()),
            ctx,
            settings,
            probe,
            reporter,
            runtime: ServiceRuntimeState::default(),
            last_status: None,
        }
    }

    /// Replace the desired state for subsequent events
    pub fn set_desired(&mut self, desired: DesiredState) {
        self.ctx.desired = desired;
    }

    /// What has been observed about the service so far
    pub fn runtime(&self) -> &ServiceRuntimeState {
        &self.runtime
    }

    /// Status most recently reported
    pub fn last_status(&self) -> Option<&UnitStatus> {
        self.last_status.as_ref()
    }

    /// Handle one event to completion
    ///
    /// Returns the status the event ended in, or `None` when it left the unit
    /// status untouched. Step failures end in [`UnitStatus::Blocked`] and are
    /// not errors; only a failure to report status is.
    pub async fn handle(&mut self, event: &Event) -> Result<Option<UnitStatus>> {
        info!(unit = %self.ctx.unit, event = %event, "Handling event");

        let outcome = match event {
            Event::Install => self.install().await,
            Event::ConfigChanged => self.config_changed().await,
            Event::Start => self.start().await,
            Event::Stop => self.stop().await,
            Event::UpdateStatus => self.update_status().await,
            Event::UpgradeCharm => self.upgrade().await,
            Event::PeerJoined(relation) | Event::PeerChanged(relation) => {
                self.publish_to(relation).await
            }
            Event::PeerDeparted(relation) | Event::PeerBroken(relation) => {
                info!(unit = %self.ctx.unit, relation = %relation, "Consumer gone, nothing to do");
                Ok(None)
            }
        };

        let status = match outcome {
            Ok(status) => status,
            Err(StepError {
                step: Step::Report,
                source,
            }) => return Err(source),
            Err(err) => {
                warn!(unit = %self.ctx.unit, event = %event, step = %err.step, "{}", err);
                self.runtime.record_error(err.to_string());
                Some(UnitStatus::Blocked(err.to_string()))
            }
        };

        if let Some(status) = &status {
            self.report(status.clone()).await.map_err(|e| e.source)?;
        }
        Ok(status)
    }

    async fn install(&mut self) -> StepResult {
        self.report(UnitStatus::Installing(format!(
            "Installing {} from {}",
            self.settings.package, self.ctx.desired.package_channel
        )))
        .await?;

        let info = self
            .package
            .ensure_installed(&self.ctx.desired.package_channel)
            .await
            .during(Step::Install)?;
        self.publish_version(&info).await?;
        Ok(Some(UnitStatus::Active(None)))
    }

    async fn config_changed(&mut self) -> StepResult {
        self.report(UnitStatus::Configuring(format!(
            "Configuring {} on port {}",
            self.settings.package, self.ctx.desired.port
        )))
        .await?;

        self.config
            .apply(&self.ctx.desired)
            .await
            .during(Step::ApplyConfig)?;
        self.firewall
            .reconcile(self.ctx.desired.port)
            .await
            .during(Step::Firewall)?;
        self.service.restart().await.during(Step::Restart)?;
        self.runtime.record_running(true);

        let record = self.endpoint_record();
        let published = self
            .publisher
            .republish(&record)
            .await
            .during(Step::Publish)?;
        debug!("Republished endpoint on {} relation(s)", published);

        Ok(Some(UnitStatus::Active(None)))
    }

    async fn start(&mut self) -> StepResult {
        self.service.start().await.during(Step::Start)?;
        self.runtime.record_running(true);
        Ok(Some(UnitStatus::Active(None)))
    }

    async fn stop(&mut self) -> StepResult {
        self.service.stop().await.during(Step::Stop)?;
        self.runtime.record_running(false);
        Ok(Some(UnitStatus::Stopped))
    }

    async fn update_status(&mut self) -> StepResult {
        let host = self.ctx.probe_host().to_string();
        let port = self.ctx.desired.port;

        match self.probe.check(&host, port).await {
            HealthStatus::Healthy => {
                self.runtime.record_probe(None);
                Ok(Some(UnitStatus::Active(None)))
            }
            HealthStatus::Unhealthy(reason) => {
                self.runtime.record_probe(Some(reason.clone()));
                Err(Error::HealthCheckFailed {
                    url: probe_url(&host, port),
                    reason,
                })
                .during(Step::HealthCheck)
            }
        }
    }

    async fn upgrade(&mut self) -> StepResult {
        self.report(UnitStatus::Installing(format!(
            "Upgrading {} from {}",
            self.settings.package, self.ctx.desired.package_channel
        )))
        .await?;

        let info = self
            .package
            .upgrade(&self.ctx.desired.package_channel)
            .await
            .during(Step::Upgrade)?;
        self.publish_version(&info).await?;

        self.config_changed().await?;
        self.service.restart().await.during(Step::Restart)?;
        self.service
            .wait_until_running(
                self.settings.running_wait(),
                self.settings.running_poll_interval(),
            )
            .await
            .during(Step::WaitRunning)?;

        self.update_status().await
    }

    async fn publish_to(&mut self, relation: &RelationId) -> StepResult {
        let record = self.endpoint_record();
        self.publisher
            .publish(&record, relation)
            .await
            .during(Step::Publish)?;
        Ok(None)
    }

    async fn publish_version(&mut self, info: &InstalledPackageInfo) -> StepResult<()> {
        self.reporter
            .set_application_version(info.application_version())
            .await
            .during(Step::Version)
    }

    async fn report(&mut self, status: UnitStatus) -> StepResult<()> {
        self.reporter
            .set_status(&status)
            .await
            .during(Step::Report)?;
        self.last_status = Some(status);
        Ok(())
    }

    fn endpoint_record(&self) -> EndpointRecord {
        EndpointRecord::for_unit(
            &self.ctx,
            &self.settings.package,
            &self.settings.service_options,
        )
    }
}

impl fmt::Debug for LifecycleOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleOrchestrator")
            .field("ctx", &self.ctx)
            .field("runtime", &self.runtime)
            .field("last_status", &self.last_status)
            .finish_non_exhaustive()
    }
}
