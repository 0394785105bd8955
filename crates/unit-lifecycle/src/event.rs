//! Lifecycle events and the static table that maps hook names onto them.

use crate::error::{Error, Result};
use crate::registry::RelationId;
use std::fmt;

/// The kinds of event the orchestrator handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Package must be installed
    Install,
    /// Operator options changed
    ConfigChanged,
    /// Service should run
    Start,
    /// Service should stop
    Stop,
    /// Periodic health observation
    UpdateStatus,
    /// Agent code was upgraded
    UpgradeCharm,
    /// A consumer joined the endpoint relation
    PeerJoined,
    /// A consumer changed its side of the relation
    PeerChanged,
    /// A consumer left the relation
    PeerDeparted,
    /// The relation is being torn down
    PeerBroken,
}

/// Hook names that are not tied to a relation
const UNIT_HOOKS: &[(&str, EventKind)] = &[
    ("install", EventKind::Install),
    ("config-changed", EventKind::ConfigChanged),
    ("start", EventKind::Start),
    ("stop", EventKind::Stop),
    ("update-status", EventKind::UpdateStatus),
    ("upgrade-charm", EventKind::UpgradeCharm),
];

/// Suffixes of `<endpoint>-relation-<suffix>` hook names
const RELATION_HOOKS: &[(&str, EventKind)] = &[
    ("joined", EventKind::PeerJoined),
    ("changed", EventKind::PeerChanged),
    ("departed", EventKind::PeerDeparted),
    ("broken", EventKind::PeerBroken),
];

impl EventKind {
    /// Look up the kind for a hook name
    ///
    /// Relation hooks only match for `endpoint`; anything else is unknown.
    pub fn from_hook(hook: &str, endpoint: &str) -> Option<Self> {
        if let Some((_, kind)) = UNIT_HOOKS.iter().find(|(name, _)| *name == hook) {
            return Some(*kind);
        }
        let suffix = hook
            .strip_prefix(endpoint)?
            .strip_prefix("-relation-")?;
        RELATION_HOOKS
            .iter()
            .find(|(name, _)| *name == suffix)
            .map(|(_, kind)| *kind)
    }
}

/// One event delivered to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Install the package
    Install,
    /// Reconcile settings, firewall and service against new options
    ConfigChanged,
    /// Start the service
    Start,
    /// Stop the service
    Stop,
    /// Probe the service
    UpdateStatus,
    /// Upgrade the package and re-reconcile
    UpgradeCharm,
    /// A consumer joined relation
    PeerJoined(RelationId),
    /// A consumer changed relation data
    PeerChanged(RelationId),
    /// A consumer left relation
    PeerDeparted(RelationId),
    /// Relation is going away
    PeerBroken(RelationId),
}

impl Event {
    /// Resolve a hook invocation into an event
    ///
    /// `endpoint` is the relation endpoint the agent serves and `relation_id`
    /// the id the platform supplied, required for relation hooks.
    pub fn from_hook(hook: &str, endpoint: &str, relation_id: Option<&str>) -> Result<Self> {
        let kind = EventKind::from_hook(hook, endpoint)
            .ok_or_else(|| Error::UnknownEvent(hook.to_string()))?;

        let relation = || {
            relation_id
                .filter(|id| !id.trim().is_empty())
                .map(RelationId::new)
                .ok_or_else(|| Error::UnknownEvent(format!("{} without a relation id", hook)))
        };

        Ok(match kind {
            EventKind::Install => Event::Install,
            EventKind::ConfigChanged => Event::ConfigChanged,
            EventKind::Start => Event::Start,
            EventKind::Stop => Event::Stop,
            EventKind::UpdateStatus => Event::UpdateStatus,
            EventKind::UpgradeCharm => Event::UpgradeCharm,
            EventKind::PeerJoined => Event::PeerJoined(relation()?),
            EventKind::PeerChanged => Event::PeerChanged(relation()?),
            EventKind::PeerDeparted => Event::PeerDeparted(relation()?),
            EventKind::PeerBroken => Event::PeerBroken(relation()?),
        })
    }

    /// The kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Install => EventKind::Install,
            Event::ConfigChanged => EventKind::ConfigChanged,
            Event::Start => EventKind::Start,
            Event::Stop => EventKind::Stop,
            Event::UpdateStatus => EventKind::UpdateStatus,
            Event::UpgradeCharm => EventKind::UpgradeCharm,
            Event::PeerJoined(_) => EventKind::PeerJoined,
            Event::PeerChanged(_) => EventKind::PeerChanged,
            Event::PeerDeparted(_) => EventKind::PeerDeparted,
            Event::PeerBroken(_) => EventKind::PeerBroken,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::PeerJoined(id)
            | Event::PeerChanged(id)
            | Event::PeerDeparted(id)
            | Event::PeerBroken(id) => write!(f, "{:?}({})", self.kind(), id),
            _ => write!(f, "{:?}", self.kind()),
        }
    }
}

/// Hook name from a dispatch path such as `hooks/config-changed`
pub fn hook_name_from_dispatch_path(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_hooks() {
        assert_eq!(
            Event::from_hook("install", "website", None).unwrap(),
            Event::Install
        );
        assert_eq!(
            Event::from_hook("config-changed", "website", None).unwrap(),
            Event::ConfigChanged
        );
        assert_eq!(
            Event::from_hook("upgrade-charm", "website", Some("website:1")).unwrap(),
            Event::UpgradeCharm
        );
    }

    #[test]
    fn test_relation_hooks() {
        let event = Event::from_hook("website-relation-joined", "website", Some("website:4")).unwrap();
        assert_eq!(event, Event::PeerJoined(RelationId::new("website:4")));
        assert_eq!(event.to_string(), "PeerJoined(website:4)");

        let event = Event::from_hook("website-relation-broken", "website", Some("website:4")).unwrap();
        assert_eq!(event.kind(), EventKind::PeerBroken);
    }

    #[test]
    fn test_unknown_hooks_are_rejected() {
        for hook in ["leader-elected", "db-relation-joined", "website-relation-created", ""] {
            assert!(
                matches!(
                    Event::from_hook(hook, "website", Some("website:1")),
                    Err(Error::UnknownEvent(_))
                ),
                "{hook} should be unknown"
            );
        }
    }

    #[test]
    fn test_relation_hook_requires_id() {
        assert!(matches!(
            Event::from_hook("website-relation-changed", "website", None),
            Err(Error::UnknownEvent(_))
        ));
        assert!(matches!(
            Event::from_hook("website-relation-changed", "website", Some(" ")),
            Err(Error::UnknownEvent(_))
        ));
    }

    #[test]
    fn test_dispatch_path() {
        assert_eq!(hook_name_from_dispatch_path("hooks/update-status"), "update-status");
        assert_eq!(hook_name_from_dispatch_path("install"), "install");
    }
}
