//! Relation registry backends
//!
//! The registry is the shared, per-relation key-value exchange through which
//! this unit publishes its endpoint. Each unit owns one databag per relation;
//! writing an empty value removes a key.

pub mod hook_tools;
pub mod memory;

pub use hook_tools::HookToolRegistry;
pub use memory::MemoryRegistry;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;

/// One unit's key-value data on one relation
pub type Databag = BTreeMap<String, String>;

/// Platform identifier of one relation, e.g. `website:3`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationId(String);

impl RelationId {
    /// Wrap a relation id as reported by the platform
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for relation registry backends
#[async_trait]
pub trait RelationRegistry: Send + Sync {
    /// Relations currently established on `endpoint`
    async fn relation_ids(&self, endpoint: &str) -> Result<Vec<RelationId>>;

    /// Remote units participating in a relation
    async fn related_units(&self, relation: &RelationId) -> Result<Vec<String>>;

    /// A unit's databag on a relation
    async fn read(&self, relation: &RelationId, unit: &str) -> Result<Databag>;

    /// Apply `changes` to the local unit's databag; empty values delete keys
    async fn write(&self, relation: &RelationId, changes: &Databag) -> Result<()>;
}
