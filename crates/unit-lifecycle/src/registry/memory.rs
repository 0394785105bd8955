//! In-memory relation registry

use super::{Databag, RelationId, RelationRegistry};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
struct Relation {
    endpoint: String,
    databags: BTreeMap<String, Databag>,
}

/// In-memory registry backend
///
/// Holds every relation the local unit takes part in, with one databag per
/// participating unit.
#[derive(Debug)]
pub struct MemoryRegistry {
    local_unit: String,
    relations: RwLock<BTreeMap<RelationId, Relation>>,
    reject_writes: RwLock<bool>,
}

impl MemoryRegistry {
    /// Create a registry as seen by `local_unit`
    pub fn new(local_unit: impl Into<String>) -> Self {
        Self {
            local_unit: local_unit.into(),
            relations: RwLock::new(BTreeMap::new()),
            reject_writes: RwLock::new(false),
        }
    }

    /// Establish a relation on `endpoint`
    pub fn add_relation(&self, endpoint: &str, id: &RelationId) {
        let mut relations = self.relations.write().unwrap_or_else(PoisonError::into_inner);
        relations.entry(id.clone()).or_insert_with(|| Relation {
            endpoint: endpoint.to_string(),
            databags: BTreeMap::new(),
        });
    }

    /// Add a remote unit with its databag to a relation
    pub fn join(&self, id: &RelationId, unit: &str, data: Databag) {
        let mut relations = self.relations.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(relation) = relations.get_mut(id) {
            relation.databags.insert(unit.to_string(), data);
        }
    }

    /// Make every subsequent write fail
    pub fn reject_writes(&self, reject: bool) {
        *self.reject_writes.write().unwrap_or_else(PoisonError::into_inner) = reject;
    }

    /// The local unit's databag on a relation
    pub fn local_data(&self, id: &RelationId) -> Databag {
        let relations = self.relations.read().unwrap_or_else(PoisonError::into_inner);
        relations
            .get(id)
            .and_then(|relation| relation.databags.get(&self.local_unit))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RelationRegistry for MemoryRegistry {
    async fn relation_ids(&self, endpoint: &str) -> Result<Vec<RelationId>> {
        let relations = self.relations.read().unwrap_or_else(PoisonError::into_inner);
        Ok(relations
            .iter()
            .filter(|(_, relation)| relation.endpoint == endpoint)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn related_units(&self, relation: &RelationId) -> Result<Vec<String>> {
        let relations = self.relations.read().unwrap_or_else(PoisonError::into_inner);
        let relation = relations
            .get(relation)
            .ok_or_else(|| Error::PublishFailed(format!("no relation {}", relation)))?;
        Ok(relation
            .databags
            .keys()
            .filter(|unit| **unit != self.local_unit)
            .cloned()
            .collect())
    }

    async fn read(&self, relation: &RelationId, unit: &str) -> Result<Databag> {
        let relations = self.relations.read().unwrap_or_else(PoisonError::into_inner);
        let relation = relations
            .get(relation)
            .ok_or_else(|| Error::PublishFailed(format!("no relation {}", relation)))?;
        Ok(relation.databags.get(unit).cloned().unwrap_or_default())
    }

    async fn write(&self, relation: &RelationId, changes: &Databag) -> Result<()> {
        if *self.reject_writes.read().unwrap_or_else(PoisonError::into_inner) {
            return Err(Error::PublishFailed(format!(
                "write to {} rejected",
                relation
            )));
        }
        let mut relations = self.relations.write().unwrap_or_else(PoisonError::into_inner);
        let relation_data = relations
            .get_mut(relation)
            .ok_or_else(|| Error::PublishFailed(format!("no relation {}", relation)))?;
        let databag = relation_data
            .databags
            .entry(self.local_unit.clone())
            .or_default();
        for (key, value) in changes {
            if value.is_empty() {
                databag.remove(key);
            } else {
                databag.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}
