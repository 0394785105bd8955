//! # Unit lifecycle
//!
//! Reconciles a single unit of the microsample service against the state its
//! operator asked for: the package is installed from the requested channel,
//! its settings carry the requested address and port, the firewall exposes
//! exactly that port, the service runs, and every consumer relation holds an
//! up-to-date endpoint record.
//!
//! Work is driven by platform events. [`LifecycleOrchestrator::handle`] runs
//! one event to completion and reports the resulting [`UnitStatus`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use command_executor::Executor;
//! use unit_lifecycle::{
//!     AgentSettings, CharmConfig, DesiredState, Event, HookToolRegistry, HookToolStatus,
//!     HttpProbe, LifecycleOrchestrator, UnitContext, UnitIdentity,
//! };
//!
//! # async fn example() -> unit_lifecycle::Result<()> {
//! let settings = AgentSettings::default();
//! let executor = Executor::local("microsample");
//! let desired = DesiredState::resolve(&CharmConfig::default(), &settings);
//! let ctx = UnitContext::new(UnitIdentity::new("microsample/0"), desired, "10.0.0.7");
//!
//! let mut orchestrator = LifecycleOrchestrator::new(
//!     ctx,
//!     settings.clone(),
//!     executor.clone(),
//!     Arc::new(HookToolRegistry::new(executor.clone())),
//!     Arc::new(HttpProbe::new(settings.probe_timeout())?),
//!     Arc::new(HookToolStatus::new(executor)),
//! );
//! orchestrator.handle(&Event::ConfigChanged).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod firewall;
pub mod health;
pub mod hook_tools;
pub mod orchestrator;
pub mod package;
pub mod publisher;
pub mod registry;
pub mod service;
pub mod settings;
pub mod status;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::{AgentSettings, CharmConfig, ConfigError, DesiredState};
pub use context::{UnitContext, UnitIdentity};
pub use error::{Error, ParseError, Result};
pub use event::{Event, EventKind};
pub use firewall::{Firewall, FirewallChanges, PortSpec, Protocol};
pub use health::{HealthProbe, HealthStatus, HttpProbe};
pub use hook_tools::HookToolStatus;
pub use orchestrator::{LifecycleOrchestrator, Step, StepError};
pub use package::{InstalledPackageInfo, SnapPackage};
pub use publisher::{EndpointPublisher, EndpointRecord, ServerEntry, ServiceSpec};
pub use registry::{Databag, HookToolRegistry, MemoryRegistry, RelationId, RelationRegistry};
pub use service::ServiceController;
pub use settings::SnapSettings;
pub use status::{ServiceRuntimeState, StatusReporter, UnitStatus};
