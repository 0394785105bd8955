//! Explicit per-pass context handed to the orchestrator.

use crate::config::DesiredState;
use std::fmt;

/// Identity of this unit among its peers, e.g. `microsample/0`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitIdentity(String);

impl UnitIdentity {
    /// Wrap a unit name as assigned by the platform
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The unit name as the platform knows it
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name for the load-balancer server entry generated for this unit
    ///
    /// `/` is not allowed in backend server names, so `microsample/0` becomes
    /// `microsample_unit_microsample-0` for service `microsample`.
    pub fn server_name(&self, service: &str) -> String {
        format!("{}_unit_{}", service, self.0.replace('/', "-"))
    }
}

impl fmt::Display for UnitIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a handler needs to know about "this unit" for one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitContext {
    /// Who we are
    pub unit: UnitIdentity,
    /// What the operator asked for
    pub desired: DesiredState,
    /// Address peers reach this unit on
    pub private_address: String,
}

impl UnitContext {
    /// Build a context for one pass
    pub fn new(unit: UnitIdentity, desired: DesiredState, private_address: impl Into<String>) -> Self {
        Self {
            unit,
            desired,
            private_address: private_address.into(),
        }
    }

    /// Host the health probe should connect to
    ///
    /// A wildcard bind address cannot be dialled meaningfully, so the unit's
    /// private address stands in for it.
    pub fn probe_host(&self) -> &str {
        if self.desired.binds_all_interfaces() {
            &self.private_address
        } else {
            self.desired.bind_address.trim()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desired(host: &str) -> DesiredState {
        DesiredState {
            port: 8080,
            bind_address: host.to_string(),
            package_channel: "edge".to_string(),
        }
    }

    #[test]
    fn test_server_name() {
        let unit = UnitIdentity::new("microsample/3");
        assert_eq!(unit.server_name("microsample"), "microsample_unit_microsample-3");
    }

    #[test]
    fn test_probe_host() {
        let unit = UnitIdentity::new("microsample/0");

        let ctx = UnitContext::new(unit.clone(), desired("0.0.0.0"), "10.1.2.3");
        assert_eq!(ctx.probe_host(), "10.1.2.3");

        let ctx = UnitContext::new(unit, desired("127.0.0.1"), "10.1.2.3");
        assert_eq!(ctx.probe_host(), "127.0.0.1");
    }
}
