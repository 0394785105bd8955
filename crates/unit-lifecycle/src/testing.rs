//! In-memory test doubles for the host and the platform.
//!
//! [`FakeHost`] scripts the package manager, firewall hook tools and service
//! manager behind a [`Backend`], recording every command line in order so
//! tests can assert on sequencing.

use crate::error::{Error, Result};
use crate::health::{HealthProbe, HealthStatus};
use crate::status::{StatusReporter, UnitStatus};
use async_trait::async_trait;
use command_executor::{Backend, Command, CommandOutput, Executor};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Version handed out by `snap install`/`snap refresh` for unscripted channels
const DEFAULT_VERSION: &str = "v1.0";

#[derive(Debug, Clone)]
struct FakePackage {
    name: String,
    version: String,
    tracking: String,
}

#[derive(Debug, Default)]
struct HostState {
    packages: Vec<FakePackage>,
    channel_versions: BTreeMap<String, String>,
    opened: BTreeSet<String>,
    settings: BTreeMap<String, String>,
    service_active: bool,
    service_stuck: bool,
    failures: Vec<String>,
    outputs: Vec<(String, String)>,
    calls: Vec<String>,
}

impl HostState {
    fn snap_list(&self) -> String {
        if self.packages.is_empty() {
            return String::new();
        }
        let mut out = String::from("Name Version Rev Tracking Publisher Notes\n");
        for (rev, pkg) in self.packages.iter().enumerate() {
            out.push_str(&format!(
                "{} {} {} {} fake-publisher -\n",
                pkg.name,
                pkg.version,
                rev + 1,
                pkg.tracking
            ));
        }
        out
    }

    fn put_package(&mut self, name: &str, version: &str, tracking: &str) {
        self.packages.retain(|p| p.name != name);
        self.packages.push(FakePackage {
            name: name.to_string(),
            version: version.to_string(),
            tracking: tracking.to_string(),
        });
    }

    fn install_from(&mut self, name: &str, channel_arg: &str) {
        let channel = channel_arg.strip_prefix("--channel=").unwrap_or(channel_arg);
        let version = self
            .channel_versions
            .get(channel)
            .cloned()
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());
        let tracking = if channel.contains('/') {
            channel.to_string()
        } else {
            format!("latest/{}", channel)
        };
        self.put_package(name, &version, &tracking);
    }

    fn execute(&mut self, words: &[&str]) -> CommandOutput {
        match words {
            ["snap", "list"] => CommandOutput::ok(self.snap_list()),
            ["snap", "install", name, channel] | ["snap", "refresh", name, channel] => {
                self.install_from(name, channel);
                CommandOutput::ok("")
            }
            ["snap", "set", _package, pairs @ ..] => {
                for pair in pairs {
                    if let Some((key, value)) = pair.split_once('=') {
                        self.settings.insert(key.to_string(), value.to_string());
                    }
                }
                CommandOutput::ok("")
            }
            ["opened-ports"] => {
                let listing: Vec<&str> = self.opened.iter().map(String::as_str).collect();
                CommandOutput::ok(listing.join("\n"))
            }
            ["open-port", spec] => {
                self.opened.insert(spec.to_string());
                CommandOutput::ok("")
            }
            ["close-port", spec] => {
                self.opened.remove(*spec);
                CommandOutput::ok("")
            }
            ["systemctl", "is-active", _] => {
                if self.service_stuck {
                    CommandOutput {
                        stdout: "activating\n".to_string(),
                        ..CommandOutput::failed(3, "")
                    }
                } else if self.service_active {
                    CommandOutput::ok("active\n")
                } else {
                    CommandOutput {
                        stdout: "inactive\n".to_string(),
                        ..CommandOutput::failed(3, "")
                    }
                }
            }
            ["systemctl", "start" | "restart", _] => {
                self.service_active = true;
                CommandOutput::ok("")
            }
            ["systemctl", "stop", _] => {
                self.service_active = false;
                CommandOutput::ok("")
            }
            _ => CommandOutput::ok(""),
        }
    }
}

/// Scripted host that records every command it is asked to run
///
/// Clones share state, so a test keeps one handle for assertions while the
/// code under test runs through [`FakeHost::executor`].
#[derive(Debug, Clone, Default)]
pub struct FakeHost {
    state: Arc<Mutex<HostState>>,
}

impl FakeHost {
    /// An empty host: nothing installed, no ports opened, service inactive
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pre-install a package row
    pub fn with_package(self, name: &str, version: &str, tracking: &str) -> Self {
        self.install_package(name, version, tracking);
        self
    }

    /// Version that installs and refreshes from `channel` produce
    pub fn with_channel_version(self, channel: &str, version: &str) -> Self {
        self.state()
            .channel_versions
            .insert(channel.to_string(), version.to_string());
        self
    }

    /// Initial opened-ports listing
    pub fn with_opened_ports<'a>(self, specs: impl IntoIterator<Item = &'a str>) -> Self {
        self.state()
            .opened
            .extend(specs.into_iter().map(str::to_string));
        self
    }

    /// Initial service state
    pub fn with_service_active(self, active: bool) -> Self {
        self.state().service_active = active;
        self
    }

    /// The service accepts control commands but never reports `active`
    pub fn with_service_stuck(self) -> Self {
        self.state().service_stuck = true;
        self
    }

    /// Fixed stdout for every command line starting with `prefix`
    pub fn with_output(self, prefix: &str, stdout: &str) -> Self {
        self.state()
            .outputs
            .push((prefix.to_string(), stdout.to_string()));
        self
    }

    /// Every command line starting with `prefix` exits 1
    pub fn fail_on(self, prefix: &str) -> Self {
        self.state().failures.push(prefix.to_string());
        self
    }

    /// Stop failing commands that start with `prefix`
    pub fn recover(&self, prefix: &str) {
        self.state().failures.retain(|f| f != prefix);
    }

    /// Install or replace a package row while a test runs
    pub fn install_package(&self, name: &str, version: &str, tracking: &str) {
        self.state().put_package(name, version, tracking);
    }

    /// An executor whose commands run against this host
    pub fn executor(&self) -> Executor {
        Executor::new("fake-host", self.clone())
    }

    /// Every command line run so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Command lines starting with `prefix`, in order
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of command lines starting with `prefix`
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls_matching(prefix).len()
    }

    /// Position of the first command line starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.state().calls.iter().position(|c| c.starts_with(prefix))
    }

    /// Forget recorded calls, keeping host state
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Currently opened specs, sorted
    pub fn opened_ports(&self) -> Vec<String> {
        self.state().opened.iter().cloned().collect()
    }

    /// Value written with `snap set`
    pub fn setting(&self, key: &str) -> Option<String> {
        self.state().settings.get(key).cloned()
    }

    /// Whether the fake service manager considers the service running
    pub fn service_active(&self) -> bool {
        let state = self.state();
        state.service_active && !state.service_stuck
    }
}

#[async_trait]
impl Backend for FakeHost {
    async fn execute(&self, command: &Command) -> command_executor::Result<CommandOutput> {
        let line = command.to_string();
        let mut state = self.state();
        state.calls.push(line.clone());

        if state.failures.iter().any(|prefix| line.starts_with(prefix)) {
            return Ok(CommandOutput::failed(1, "simulated failure"));
        }
        if let Some((_, stdout)) = state
            .outputs
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix))
        {
            return Ok(CommandOutput::ok(stdout.clone()));
        }

        let words = command.words();
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        Ok(state.execute(&words))
    }
}

/// Status sink that keeps everything it is told
#[derive(Debug, Default)]
pub struct RecordingReporter {
    statuses: Mutex<Vec<UnitStatus>>,
    versions: Mutex<Vec<String>>,
    failing: Mutex<bool>,
}

impl RecordingReporter {
    /// An empty reporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every report fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(PoisonError::into_inner) = failing;
    }

    /// Every status reported, in order
    pub fn statuses(&self) -> Vec<UnitStatus> {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent status
    pub fn last(&self) -> Option<UnitStatus> {
        self.statuses().pop()
    }

    /// Every application version reported, in order
    pub fn versions(&self) -> Vec<String> {
        self.versions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check(&self) -> Result<()> {
        if *self.failing.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(Error::StatusReport(command_executor::Error::NonZeroExit {
                command: "status-set".to_string(),
                code: Some(1),
                stderr: "simulated failure".to_string(),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl StatusReporter for RecordingReporter {
    async fn set_status(&self, status: &UnitStatus) -> Result<()> {
        self.check()?;
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(status.clone());
        Ok(())
    }

    async fn set_application_version(&self, version: &str) -> Result<()> {
        self.check()?;
        self.versions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(version.to_string());
        Ok(())
    }
}

/// Health probe with a scripted answer
#[derive(Debug)]
pub struct StubProbe {
    answer: Mutex<HealthStatus>,
    probes: Mutex<Vec<(String, u16)>>,
}

impl StubProbe {
    /// A probe that always reports healthy
    pub fn healthy() -> Self {
        Self::answering(HealthStatus::Healthy)
    }

    fn answering(answer: HealthStatus) -> Self {
        Self {
            answer: Mutex::new(answer),
            probes: Mutex::new(Vec::new()),
        }
    }

    /// Change the scripted answer
    pub fn set(&self, answer: HealthStatus) {
        *self.answer.lock().unwrap_or_else(PoisonError::into_inner) = answer;
    }

    /// Every `(host, port)` probed, in order
    pub fn probes(&self) -> Vec<(String, u16)> {
        self.probes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl HealthProbe for StubProbe {
    async fn check(&self, host: &str, port: u16) -> HealthStatus {
        self.probes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((host.to_string(), port));
        self.answer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
