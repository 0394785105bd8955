//! `dispatch`: the executable the platform runs for every hook.
//!
//! Resolves the hook into an event, builds the unit context from the
//! platform's hook tools and hands the event to the lifecycle orchestrator.
//! Exits 0 once the event is handled, whatever status the unit ends in.

use anyhow::{Context, Result};
use clap::Parser;
use command_executor::Executor;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use unit_lifecycle::event::hook_name_from_dispatch_path;
use unit_lifecycle::hook_tools::{fetch_charm_config, private_address};
use unit_lifecycle::{
    AgentSettings, DesiredState, Event, HookToolRegistry, HookToolStatus, HttpProbe,
    LifecycleOrchestrator, UnitContext, UnitIdentity,
};

mod logging;

/// Settings file looked up in the charm directory
const SETTINGS_FILE: &str = "lifecycle.yaml";

#[derive(Parser, Debug)]
#[command(name = "dispatch")]
#[command(about = "Microsample unit agent - handles one platform hook")]
#[command(version)]
struct Cli {
    /// Hook to handle, e.g. `config-changed` (defaults to the dispatch path)
    hook: Option<String>,

    /// Path the platform invoked, e.g. `hooks/config-changed`
    #[arg(long, env = "JUJU_DISPATCH_PATH")]
    dispatch_path: Option<String>,

    /// Name of this unit, e.g. `microsample/0`
    #[arg(long, env = "JUJU_UNIT_NAME")]
    unit: String,

    /// Relation the hook fired for
    #[arg(long, env = "JUJU_RELATION_ID")]
    relation_id: Option<String>,

    /// Charm directory holding the settings file
    #[arg(long, env = "JUJU_CHARM_DIR", default_value = ".")]
    charm_dir: PathBuf,

    /// Settings file path (defaults to lifecycle.yaml in the charm directory)
    #[arg(short, long)]
    settings: Option<PathBuf>,
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.settings
            .clone()
            .unwrap_or_else(|| self.charm_dir.join(SETTINGS_FILE))
    }

    fn hook_name(&self) -> Option<String> {
        resolve_hook(self.hook.as_deref(), self.dispatch_path.as_deref())
    }
}

/// Hook name from an explicit argument, else from the dispatch path
fn resolve_hook(hook: Option<&str>, dispatch_path: Option<&str>) -> Option<String> {
    hook.or_else(|| dispatch_path.map(hook_name_from_dispatch_path))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = AgentSettings::load_or_default(&cli.settings_path());
    logging::init(
        settings
            .as_ref()
            .ok()
            .and_then(|s| s.log_level.as_deref()),
    );

    let result = settings
        .with_context(|| format!("failed to load {}", cli.settings_path().display()))
        .and_then(|settings| run(cli, settings));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Dispatch failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, settings: AgentSettings) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(dispatch(cli, settings))
}

async fn dispatch(cli: Cli, settings: AgentSettings) -> Result<()> {
    let hook = cli
        .hook_name()
        .context("no hook given and JUJU_DISPATCH_PATH is unset")?;
    let event = Event::from_hook(&hook, &settings.relation, cli.relation_id.as_deref())?;

    let executor = Executor::local(settings.package.clone())
        .with_default_timeout(settings.command_timeout());
    let config = fetch_charm_config(&executor).await?;
    let address = private_address(&executor).await?;
    let desired = DesiredState::resolve(&config, &settings);
    let ctx = UnitContext::new(UnitIdentity::new(cli.unit), desired, address);
    let probe = HttpProbe::new(settings.probe_timeout())?;

    let mut orchestrator = LifecycleOrchestrator::new(
        ctx,
        settings,
        executor.clone(),
        Arc::new(HookToolRegistry::new(executor.clone())),
        Arc::new(probe),
        Arc::new(HookToolStatus::new(executor)),
    );

    match orchestrator.handle(&event).await? {
        Some(status) => info!(event = %event, "Handled, unit is {}", status),
        None => info!(event = %event, "Handled, status unchanged"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_hook() {
        assert_eq!(
            resolve_hook(None, Some("hooks/config-changed")).as_deref(),
            Some("config-changed")
        );
        assert_eq!(
            resolve_hook(Some("install"), Some("hooks/config-changed")).as_deref(),
            Some("install")
        );
        assert_eq!(resolve_hook(None, None), None);
        assert_eq!(resolve_hook(Some(" "), None), None);
    }

    #[test]
    fn test_settings_path() {
        let cli = Cli::try_parse_from([
            "dispatch",
            "install",
            "--unit",
            "microsample/0",
            "--charm-dir",
            "/var/lib/juju/agents/unit-microsample-0/charm",
        ])
        .unwrap();
        assert_eq!(
            cli.settings_path(),
            PathBuf::from("/var/lib/juju/agents/unit-microsample-0/charm/lifecycle.yaml")
        );

        let cli = Cli::try_parse_from([
            "dispatch",
            "--unit",
            "microsample/0",
            "--settings",
            "/etc/lifecycle.yaml",
        ])
        .unwrap();
        assert_eq!(cli.settings_path(), PathBuf::from("/etc/lifecycle.yaml"));
    }

    #[test]
    fn test_settings_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            "relation: http\nlog_level: debug\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "dispatch",
            "--unit",
            "microsample/0",
            "--charm-dir",
            dir.path().to_str().unwrap(),
        ])
        .unwrap();
        let settings = AgentSettings::load_or_default(&cli.settings_path()).unwrap();

        assert_eq!(settings.relation, "http");
        assert_eq!(settings.log_level.as_deref(), Some("debug"));
        assert_eq!(settings.package, "microsample");
    }
}
