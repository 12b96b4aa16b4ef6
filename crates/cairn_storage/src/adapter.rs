//! Storage adapter contract.
//!
//! A persistent backend sees an entity set as rows keyed by
//! `(entity id, def id)` plus a def → table mapping. The entity set writes
//! every applied batch through an attached adapter.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use cairn_foundation::{ComponentDefId, EntityId, Error, ErrorKind, Result};

use crate::component::Component;
use crate::def::ComponentDef;

/// Row-oriented persistence for an entity set.
pub trait StorageAdapter: Send + Sync + fmt::Debug {
    /// Returns true if the def already has a table.
    fn has_def(&self, def: ComponentDefId) -> bool;

    /// Creates the table for a def.
    ///
    /// # Errors
    /// Returns a storage error if the backend rejects the def.
    fn register_def(&mut self, def: &ComponentDef) -> Result<()>;

    /// Records a new entity.
    ///
    /// # Errors
    /// Returns a storage error if the backend rejects the write.
    fn insert_entity(&mut self, id: EntityId) -> Result<()>;

    /// Deletes an entity and its rows.
    ///
    /// # Errors
    /// Returns a storage error if the backend rejects the write.
    fn delete_entity(&mut self, id: EntityId) -> Result<()>;

    /// Inserts or replaces the row of a component.
    ///
    /// # Errors
    /// Returns a storage error if the def has no table or the entity is
    /// unknown.
    fn upsert_component(&mut self, component: &Component) -> Result<()>;

    /// Deletes the row at `(entity, def)`.
    ///
    /// # Errors
    /// Returns a storage error if the backend rejects the write.
    fn delete_component(&mut self, entity: EntityId, def: ComponentDefId) -> Result<()>;

    /// Reads every row of an entity.
    ///
    /// # Errors
    /// Returns a storage error if the backend cannot be read.
    fn components_for_entity(&self, id: EntityId) -> Result<Vec<Component>>;
}

/// In-memory adapter.
#[derive(Debug, Default, Clone)]
pub struct MemoryAdapter {
    tables: BTreeMap<ComponentDefId, String>,
    entities: BTreeSet<EntityId>,
    rows: BTreeMap<(EntityId, ComponentDefId), Component>,
}

impl MemoryAdapter {
    /// Creates an empty adapter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the table name of a def.
    #[must_use]
    pub fn table(&self, def: ComponentDefId) -> Option<&str> {
        self.tables.get(&def).map(String::as_str)
    }

    /// Returns the number of stored entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns the number of stored rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

fn storage_error(message: String) -> Error {
    Error::new(ErrorKind::Storage(message))
}

impl StorageAdapter for MemoryAdapter {
    fn has_def(&self, def: ComponentDefId) -> bool {
        self.tables.contains_key(&def)
    }

    fn register_def(&mut self, def: &ComponentDef) -> Result<()> {
        let table = format!("tbl{}", def.uri().replace('/', "_"));
        self.tables.insert(def.id(), table);
        Ok(())
    }

    fn insert_entity(&mut self, id: EntityId) -> Result<()> {
        self.entities.insert(id);
        Ok(())
    }

    fn delete_entity(&mut self, id: EntityId) -> Result<()> {
        self.entities.remove(&id);
        self.rows.retain(|(eid, _), _| *eid != id);
        Ok(())
    }

    fn upsert_component(&mut self, component: &Component) -> Result<()> {
        if !self.tables.contains_key(&component.def_id()) {
            return Err(storage_error(format!(
                "no table for def {}",
                component.def_id()
            )));
        }
        if !self.entities.contains(&component.entity_id()) {
            return Err(storage_error(format!(
                "no entity {} for component {}",
                component.entity_id(),
                component.id()
            )));
        }
        self.rows.insert(
            (component.entity_id(), component.def_id()),
            component.clone(),
        );
        Ok(())
    }

    fn delete_component(&mut self, entity: EntityId, def: ComponentDefId) -> Result<()> {
        self.rows.remove(&(entity, def));
        Ok(())
    }

    fn components_for_entity(&self, id: EntityId) -> Result<Vec<Component>> {
        Ok(self
            .rows
            .range((id, 0)..=(id, ComponentDefId::MAX))
            .map(|(_, c)| c.clone())
            .collect())
    }
}
