//! Package manager adapter for the managed snap.

use crate::error::{Error, ParseError, Result};
use command_executor::{Command, Executor};
use std::time::Duration;
use tracing::{debug, info};

/// Columns of `snap list`, in order
const SNAP_LIST_HEADER: [&str; 6] = ["Name", "Version", "Rev", "Tracking", "Publisher", "Notes"];

/// One row of the package manager's listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackageInfo {
    /// Instance name (`microsample`, or `microsample_dev` for a parallel install)
    pub name: String,
    /// Version string as published, e.g. `v10.1`
    pub version: String,
    /// Installed revision
    pub revision: String,
    /// Channel the install tracks, `-` for local installs
    pub channel: String,
    /// Publisher account
    pub publisher: String,
    /// Comma-separated notes, `-` when none
    pub notes: String,
}

impl InstalledPackageInfo {
    /// Version as reported to the platform, without a leading `v`
    pub fn application_version(&self) -> &str {
        self.version.strip_prefix('v').unwrap_or(&self.version)
    }

    /// Whether this row is `package` itself or one of its parallel instances
    fn is_variant_of(&self, package: &str) -> bool {
        self.name == package
            || self
                .name
                .strip_prefix(package)
                .is_some_and(|rest| rest.starts_with('_'))
    }
}

/// Parse the output of `snap list`
///
/// An empty listing yields no rows. Any row without exactly six fields is an
/// error, as is a missing header.
pub fn parse_snap_list(output: &str) -> std::result::Result<Vec<InstalledPackageInfo>, ParseError> {
    let mut lines = output.lines().filter(|line| !line.trim().is_empty());

    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    if !header.split_whitespace().eq(SNAP_LIST_HEADER) {
        return Err(ParseError::Header(header.to_string()));
    }

    lines
        .map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields[..] {
                [name, version, revision, channel, publisher, notes] => Ok(InstalledPackageInfo {
                    name: name.to_string(),
                    version: version.to_string(),
                    revision: revision.to_string(),
                    channel: channel.to_string(),
                    publisher: publisher.to_string(),
                    notes: notes.to_string(),
                }),
                _ => Err(ParseError::FieldCount {
                    line: line.to_string(),
                    expected: SNAP_LIST_HEADER.len(),
                    found: fields.len(),
                }),
            }
        })
        .collect()
}

/// `snap list` in the C locale, so the header reads as [`SNAP_LIST_HEADER`]
fn list_command() -> Command {
    Command::builder("snap")
        .arg("list")
        .env("LC_ALL", "C")
        .build()
}

/// Installs and inspects one snap
#[derive(Debug, Clone)]
pub struct SnapPackage {
    executor: Executor,
    name: String,
    install_timeout: Duration,
}

impl SnapPackage {
    /// Create an adapter for the named snap
    pub fn new(executor: Executor, name: impl Into<String>, install_timeout: Duration) -> Self {
        Self {
            executor,
            name: name.into(),
            install_timeout,
        }
    }

    /// The installed instance of the package, if any
    ///
    /// Several matching instances is an error: there is no safe way to pick one.
    pub async fn query_installed(&self) -> Result<Option<InstalledPackageInfo>> {
        let output = self
            .executor
            .run(list_command())
            .await
            .map_err(Error::InstallFailed)?;

        let mut variants: Vec<InstalledPackageInfo> = parse_snap_list(&output.stdout)?
            .into_iter()
            .filter(|row| row.is_variant_of(&self.name))
            .collect();

        if variants.len() > 1 {
            return Err(Error::AmbiguousInstallState {
                package: self.name.clone(),
                found: variants
                    .iter()
                    .map(|v| format!("{} {} ({})", v.name, v.version, v.channel))
                    .collect(),
            });
        }
        Ok(variants.pop())
    }

    /// Install the package from `channel` unless some version is already present
    ///
    /// An existing install is left alone; moving it is [`upgrade`](Self::upgrade)'s job.
    pub async fn ensure_installed(&self, channel: &str) -> Result<InstalledPackageInfo> {
        if let Some(info) = self.query_installed().await? {
            debug!(
                "{} {} already installed from {}",
                info.name, info.version, info.channel
            );
            return Ok(info);
        }

        self.install(channel).await?;
        self.require_installed().await
    }

    /// Bring the package to the latest revision on `channel`, installing it if absent
    pub async fn upgrade(&self, channel: &str) -> Result<InstalledPackageInfo> {
        match self.query_installed().await? {
            Some(_) => {
                info!("Refreshing {} from channel {}", self.name, channel);
                let cmd = Command::builder("snap")
                    .arg("refresh")
                    .arg(&self.name)
                    .arg(format!("--channel={}", channel))
                    .timeout(self.install_timeout)
                    .build();
                self.executor.run(cmd).await.map_err(Error::InstallFailed)?;
            }
            None => self.install(channel).await?,
        }
        self.require_installed().await
    }

    /// Version of the installed package
    pub async fn current_version(&self) -> Result<String> {
        Ok(self.require_installed().await?.version)
    }

    async fn install(&self, channel: &str) -> Result<()> {
        info!("Installing {} from channel {}", self.name, channel);
        let cmd = Command::builder("snap")
            .arg("install")
            .arg(&self.name)
            .arg(format!("--channel={}", channel))
            .timeout(self.install_timeout)
            .build();
        self.executor.run(cmd).await.map_err(Error::InstallFailed)?;
        Ok(())
    }

    async fn require_installed(&self) -> Result<InstalledPackageInfo> {
        self.query_installed()
            .await?
            .ok_or_else(|| Error::NotInstalled(self.name.clone()))
    }
}
