//! Firewall reconciliation through the `opened-ports`, `open-port` and
//! `close-port` hook tools.

use crate::error::{Error, ParseError, Result};
use command_executor::{Command, Executor};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Transport protocol of an opened port
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
    /// ICMP, which has no ports
    Icmp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
        })
    }
}

/// One entry of the opened-ports listing: `8080/tcp`, `1000-2000/udp` or `icmp`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortSpec {
    /// Inclusive port range, absent for ICMP
    pub range: Option<(u16, u16)>,
    /// Protocol
    pub protocol: Protocol,
}

impl PortSpec {
    /// A single TCP port
    pub fn tcp(port: u16) -> Self {
        Self {
            range: Some((port, port)),
            protocol: Protocol::Tcp,
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range {
            None => write!(f, "{}", self.protocol),
            Some((from, to)) if from == to => write!(f, "{}/{}", from, self.protocol),
            Some((from, to)) => write!(f, "{}-{}/{}", from, to, self.protocol),
        }
    }
}

impl FromStr for PortSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || ParseError::PortSpec(s.to_string());
        let s = s.trim();

        if s == "icmp" {
            return Ok(Self {
                range: None,
                protocol: Protocol::Icmp,
            });
        }

        let (ports, protocol) = s.split_once('/').ok_or_else(invalid)?;
        let protocol = match protocol {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            _ => return Err(invalid()),
        };
        let (from, to) = match ports.split_once('-') {
            Some((from, to)) => (from, to),
            None => (ports, ports),
        };
        let from: u16 = from.parse().map_err(|_| invalid())?;
        let to: u16 = to.parse().map_err(|_| invalid())?;
        if from == 0 || to < from {
            return Err(invalid());
        }

        Ok(Self {
            range: Some((from, to)),
            protocol,
        })
    }
}

/// Commands one reconciliation issued
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirewallChanges {
    /// Specs that were opened
    pub opened: Vec<PortSpec>,
    /// Specs that were closed
    pub closed: Vec<PortSpec>,
}

impl FirewallChanges {
    /// True when nothing had to change
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty() && self.closed.is_empty()
    }
}

/// Converges the unit's opened ports onto a single TCP port
#[derive(Debug, Clone)]
pub struct Firewall {
    executor: Executor,
}

impl Firewall {
    /// Create a firewall reconciler
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    /// Currently opened specs, queried fresh every time
    pub async fn opened_ports(&self) -> Result<BTreeSet<PortSpec>> {
        let output = self
            .executor
            .run(Command::new("opened-ports"))
            .await
            .map_err(Error::FirewallCommandFailed)?;

        let specs = output
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::parse)
            .collect::<std::result::Result<BTreeSet<PortSpec>, ParseError>>()?;
        Ok(specs)
    }

    /// Leave exactly `port/tcp` opened
    ///
    /// When it already is the only opened spec, the listing is the only
    /// command issued.
    pub async fn reconcile(&self, port: u16) -> Result<FirewallChanges> {
        let desired = PortSpec::tcp(port);
        let opened = self.opened_ports().await?;
        let mut changes = FirewallChanges::default();

        for stale in opened.iter().filter(|spec| **spec != desired) {
            self.tool("close-port", stale).await?;
            changes.closed.push(*stale);
        }
        if !opened.contains(&desired) {
            self.tool("open-port", &desired).await?;
            changes.opened.push(desired);
        }

        if changes.is_empty() {
            debug!("Firewall already exposes only {}", desired);
        } else {
            info!(
                "Firewall reconciled to {} (closed {:?})",
                desired,
                changes.closed.iter().map(ToString::to_string).collect::<Vec<_>>()
            );
        }
        Ok(changes)
    }

    async fn tool(&self, tool: &str, spec: &PortSpec) -> Result<()> {
        let cmd = Command::builder(tool).arg(spec.to_string()).build();
        self.executor
            .run(cmd)
            .await
            .map_err(Error::FirewallCommandFailed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    #[test]
    fn test_port_spec_parsing() {
        assert_eq!("8080/tcp".parse::<PortSpec>().unwrap(), PortSpec::tcp(8080));
        let range: PortSpec = "1000-2000/udp".parse().unwrap();
        assert_eq!(range.range, Some((1000, 2000)));
        assert_eq!(range.to_string(), "1000-2000/udp");
        assert_eq!("icmp".parse::<PortSpec>().unwrap().to_string(), "icmp");

        for bad in ["8080", "8080/sctp", "0/tcp", "20-10/tcp", "abc/tcp", "70000/tcp"] {
            assert!(bad.parse::<PortSpec>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_reconcile_closes_stale_and_opens_desired() {
        smol::block_on(async {
            let host = FakeHost::new().with_opened_ports(["8080/tcp", "22/tcp", "icmp"]);
            let firewall = Firewall::new(host.executor());

            let changes = firewall.reconcile(9090).await.unwrap();

            assert_eq!(changes.opened, vec![PortSpec::tcp(9090)]);
            assert_eq!(changes.closed.len(), 3);
            assert_eq!(host.opened_ports(), vec!["9090/tcp".to_string()]);
        });
    }

    #[test]
    fn test_reconcile_is_noop_when_converged() {
        smol::block_on(async {
            let host = FakeHost::new().with_opened_ports(["9090/tcp"]);
            let firewall = Firewall::new(host.executor());

            let changes = firewall.reconcile(9090).await.unwrap();

            assert!(changes.is_empty());
            assert_eq!(host.calls(), vec!["opened-ports".to_string()]);
        });
    }

    #[test]
    fn test_reconcile_converges_from_arbitrary_sets() {
        let initial_sets: Vec<Vec<&str>> = vec![
            vec![],
            vec!["9090/tcp"],
            vec!["9090/udp"],
            vec!["9000-9100/tcp"],
            vec!["80/tcp", "443/tcp", "9090/tcp"],
            vec!["icmp", "53/udp"],
        ];

        smol::block_on(async {
            for port in [1u16, 8080, 9090, 65535] {
                for initial in &initial_sets {
                    let host = FakeHost::new().with_opened_ports(initial.iter().copied());
                    let firewall = Firewall::new(host.executor());

                    firewall.reconcile(port).await.unwrap();

                    assert_eq!(
                        host.opened_ports(),
                        vec![format!("{}/tcp", port)],
                        "starting from {:?}",
                        initial
                    );
                }
            }
        });
    }

    #[test]
    fn test_reconcile_rejects_unparseable_listing() {
        smol::block_on(async {
            let host = FakeHost::new().with_opened_ports(["what/tcp"]);
            let firewall = Firewall::new(host.executor());

            assert!(matches!(
                firewall.reconcile(9090).await,
                Err(Error::Parse(ParseError::PortSpec(_)))
            ));
            assert_eq!(host.count_calls("close-port"), 0);
        });
    }

    #[test]
    fn test_reconcile_surfaces_tool_failure() {
        smol::block_on(async {
            let host = FakeHost::new()
                .with_opened_ports(["8080/tcp"])
                .fail_on("close-port");
            let firewall = Firewall::new(host.executor());

            assert!(matches!(
                firewall.reconcile(9090).await,
                Err(Error::FirewallCommandFailed(_))
            ));
        });
    }
}
