//! Run-scoped store of collected entities and relationships.

pub mod snapshot;

use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{ConnectorError, Result};
use crate::graph::{Entity, Relationship};

/// Read/write surface the steps and the resolver use to reach collected graph objects.
pub trait JobState {
    fn find_entity(&self, key: &str) -> Option<&Entity>;

    /// True if an entity or relationship with this `_key` was already added.
    fn has_key(&self, key: &str) -> bool;

    fn add_entity(&mut self, entity: Entity) -> Result<()>;

    fn add_relationship(&mut self, relationship: Relationship) -> Result<()>;

    fn entities_of_type(&self, entity_type: &str) -> Vec<&Entity>;

    fn set_data(&mut self, key: &str, value: Value);

    fn get_data(&self, key: &str) -> Option<&Value>;

    /// Add each entity; a duplicate `_key` is logged and skipped, the rest still land.
    fn add_entities(&mut self, entities: Vec<Entity>) -> Result<()> {
        for entity in entities {
            match self.add_entity(entity) {
                Err(ConnectorError::DuplicateKey(key)) => {
                    log::warn!("Skipping entity with duplicate key {}", key)
                }
                other => other?,
            }
        }
        Ok(())
    }

    /// Add each relationship; a duplicate `_key` is logged and skipped, the rest still land.
    fn add_relationships(&mut self, relationships: Vec<Relationship>) -> Result<()> {
        for relationship in relationships {
            match self.add_relationship(relationship) {
                Err(ConnectorError::DuplicateKey(key)) => {
                    log::warn!("Skipping relationship with duplicate key {}", key)
                }
                other => other?,
            }
        }
        Ok(())
    }
}

/// In-memory job state; insertion order is preserved for output and snapshots.
#[derive(Debug, Default)]
pub struct MemoryJobState {
    entities: Vec<Entity>,
    entity_index: HashMap<String, usize>,
    relationships: Vec<Relationship>,
    keys: HashSet<String>,
    data: HashMap<String, Value>,
}

impl MemoryJobState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Number of entities per `_type`, sorted by type.
    pub fn entity_type_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entity in &self.entities {
            *counts.entry(entity.entity_type.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Number of relationships per `_type`, sorted by type.
    pub fn relationship_type_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for relationship in &self.relationships {
            *counts
                .entry(relationship.relationship_type().to_string())
                .or_insert(0) += 1;
        }
        counts
    }

    fn claim_key(&mut self, key: &str) -> Result<()> {
        if !self.keys.insert(key.to_string()) {
            return Err(ConnectorError::DuplicateKey(key.to_string()));
        }
        Ok(())
    }
}

impl JobState for MemoryJobState {
    fn find_entity(&self, key: &str) -> Option<&Entity> {
        self.entity_index.get(key).map(|&idx| &self.entities[idx])
    }

    fn has_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    fn add_entity(&mut self, entity: Entity) -> Result<()> {
        self.claim_key(&entity.key)?;
        self.entity_index.insert(entity.key.clone(), self.entities.len());
        self.entities.push(entity);
        Ok(())
    }

    fn add_relationship(&mut self, relationship: Relationship) -> Result<()> {
        self.claim_key(relationship.key())?;
        self.relationships.push(relationship);
        Ok(())
    }

    fn entities_of_type(&self, entity_type: &str) -> Vec<&Entity> {
        self.entities
            .iter()
            .filter(|e| e.entity_type == entity_type)
            .collect()
    }

    fn set_data(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value);
    }

    fn get_data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}
