//! Entity sets.
//!
//! An [`EntitySet`] owns a registry, its members indexed by entity id, a
//! component-id index, an id allocator and an optional membership filter.
//! All mutation goes through its [`CommandBuffer`]; the buffer hands the
//! classified [`ChangeSet`] back to [`EntitySet::update`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use im::OrdMap;
use tracing::{debug, trace};
use uuid::Uuid;

use cairn_foundation::{
    BitField, ComponentDefId, ComponentId, EntityId, Error, ErrorKind, Result, hash,
};

use crate::adapter::StorageAdapter;
use crate::cmd_buffer::{ChangeSet, CommandBuffer, CommandOptions, ComponentTarget};
use crate::component::Component;
use crate::config::EntitySetConfig;
use crate::def::ComponentDef;
use crate::entity::Entity;
use crate::events::{ChangeEvent, EventBus};
use crate::filter::EntityFilter;
use crate::id::ReusableIdAllocator;
use crate::registry::{ComponentRegistry, RegisterOptions};

/// An indexed collection of entities.
///
/// A clone is a new set: it copies the members, registry and filter but
/// gets a fresh uuid and no subscribers.
pub struct EntitySet {
    uuid: Uuid,
    config: EntitySetConfig,
    registry: ComponentRegistry,
    entities: OrdMap<EntityId, Entity>,
    /// Component id → (owner, def).
    components: HashMap<ComponentId, (EntityId, ComponentDefId)>,
    ids: ReusableIdAllocator,
    filter: Option<Arc<dyn EntityFilter>>,
    events: EventBus<ChangeEvent>,
    adapter: Option<Arc<Mutex<Box<dyn StorageAdapter>>>>,
    buffer: CommandBuffer,
}

impl EntitySet {
    /// Creates an empty set with its own registry.
    #[must_use]
    pub fn new(config: EntitySetConfig) -> Self {
        Self::with_registry(config, ComponentRegistry::new())
    }

    /// Creates an empty set sharing the defs of `registry`.
    #[must_use]
    pub fn with_registry(config: EntitySetConfig, registry: ComponentRegistry) -> Self {
        let ids = ReusableIdAllocator::new(config.entity_id_start, config.component_id_start)
            .with_reuse(config.reuse_entity_ids);
        Self {
            uuid: Uuid::new_v4(),
            config,
            registry,
            entities: OrdMap::new(),
            components: HashMap::new(),
            ids,
            filter: None,
            events: EventBus::new(),
            adapter: None,
            buffer: CommandBuffer::new(),
        }
    }

    /// Returns the set's unique identity.
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &EntitySetConfig {
        &self.config
    }

    /// Returns the entity-set id embedded in allocated entity ids.
    #[must_use]
    pub const fn esid(&self) -> u32 {
        self.config.esid
    }

    /// Returns the registry.
    #[must_use]
    pub const fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Returns the registry mutably.
    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// Registers a def with the registry and any attached adapter.
    ///
    /// # Errors
    /// See [`ComponentRegistry::register`]; also fails if the adapter
    /// rejects the def.
    pub fn register_def(&mut self, def: ComponentDef, options: RegisterOptions) -> Result<ComponentDef> {
        let def = self.registry.register(def, options)?;
        if let Some(adapter) = &self.adapter {
            let mut adapter = lock(adapter)?;
            if !adapter.has_def(def.id()) {
                adapter.register_def(&def)?;
            }
        }
        Ok(def)
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Returns the member with this id. A local id (entity-set id 0) is
    /// resolved against this set's esid; provisional ids match nothing.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        if id.is_provisional() {
            return None;
        }
        self.entities.get(&id).or_else(|| {
            if id.entity_set_id() == 0 && !id.is_none() {
                self.entities.get(&id.with_entity_set_id(self.esid()))
            } else {
                None
            }
        })
    }

    /// Returns the member with this id, or an error when `throws_on_error`
    /// is set and it is missing.
    ///
    /// # Errors
    /// Returns `EntityNotFound`, with a foreign-set message when the id
    /// belongs to a different entity set.
    pub fn get_entity(&self, id: EntityId, throws_on_error: bool) -> Result<Option<&Entity>> {
        match self.entity(id) {
            Some(entity) => Ok(Some(entity)),
            None if !throws_on_error => Ok(None),
            None if id.entity_set_id() != 0 && id.entity_set_id() != self.esid() => {
                Err(Error::foreign_entity(id, self.esid()))
            }
            None => Err(Error::entity_not_found(id)),
        }
    }

    /// Returns the stored component with this id.
    #[must_use]
    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        let (entity_id, def_id) = self.components.get(&id)?;
        self.entities.get(entity_id)?.component(*def_id)
    }

    /// Returns the stored component with this id, or an error when
    /// `throws_on_error` is set and it is missing.
    ///
    /// # Errors
    /// Returns `ComponentNotFound`.
    pub fn get_component(&self, id: ComponentId, throws_on_error: bool) -> Result<Option<&Component>> {
        match self.component(id) {
            Some(c) => Ok(Some(c)),
            None if throws_on_error => Err(Error::component_not_found(id)),
            None => Ok(None),
        }
    }

    /// Returns an entity's component of a def.
    #[must_use]
    pub fn component_by_entity(&self, entity_id: EntityId, def_id: ComponentDefId) -> Option<&Component> {
        self.entity(entity_id)?.component(def_id)
    }

    /// Returns the number of members.
    #[must_use]
    pub fn size(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns member ids in ascending order.
    #[must_use]
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Iterates members in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Iterates every stored component, grouped by entity.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.entities.values().flat_map(Entity::components)
    }

    /// Returns id-and-bitfield copies of the requested entities. Unknown
    /// ids yield an empty signature.
    #[must_use]
    pub fn entity_signatures(&self, ids: &[EntityId]) -> Vec<Entity> {
        ids.iter()
            .map(|id| self.entity(*id).map_or_else(|| Entity::new(*id), Entity::signature))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Mutation through the command buffer
    // -------------------------------------------------------------------------

    fn with_buffer<T>(
        &mut self,
        f: impl FnOnce(&mut CommandBuffer, &mut Self) -> Result<T>,
    ) -> Result<T> {
        let mut buffer = std::mem::take(&mut self.buffer);
        let result = f(&mut buffer, self);
        self.buffer = buffer;
        result
    }

    /// Adds or updates a component.
    ///
    /// # Errors
    /// See [`CommandBuffer::add_components`].
    pub fn add_component(&mut self, component: Component, options: CommandOptions) -> Result<Vec<Component>> {
        self.with_buffer(|buffer, es| buffer.add_component(es, component, options))
    }

    /// Adds or updates components as one batch.
    ///
    /// # Errors
    /// See [`CommandBuffer::add_components`].
    pub fn add_components(
        &mut self,
        components: impl IntoIterator<Item = Component>,
        options: CommandOptions,
    ) -> Result<Vec<Component>> {
        self.with_buffer(|buffer, es| buffer.add_components(es, components, options))
    }

    /// Removes a component.
    ///
    /// # Errors
    /// See [`CommandBuffer::remove_components`].
    pub fn remove_component(
        &mut self,
        target: impl Into<ComponentTarget>,
        options: CommandOptions,
    ) -> Result<Vec<Component>> {
        let target = target.into();
        self.with_buffer(|buffer, es| buffer.remove_component(es, target, options))
    }

    /// Removes components as one batch.
    ///
    /// # Errors
    /// See [`CommandBuffer::remove_components`].
    pub fn remove_components(
        &mut self,
        targets: impl IntoIterator<Item = ComponentTarget>,
        options: CommandOptions,
    ) -> Result<Vec<Component>> {
        self.with_buffer(|buffer, es| buffer.remove_components(es, targets, options))
    }

    /// Adds or replaces an entity.
    ///
    /// # Errors
    /// See [`CommandBuffer::add_entities`].
    pub fn add_entity(&mut self, entity: Entity, options: CommandOptions) -> Result<Vec<Entity>> {
        self.with_buffer(|buffer, es| buffer.add_entity(es, entity, options))
    }

    /// Adds or replaces entities as one batch.
    ///
    /// # Errors
    /// See [`CommandBuffer::add_entities`].
    pub fn add_entities(
        &mut self,
        entities: impl IntoIterator<Item = Entity>,
        options: CommandOptions,
    ) -> Result<Vec<Entity>> {
        self.with_buffer(|buffer, es| buffer.add_entities(es, entities, options))
    }

    /// Removes an entity.
    ///
    /// # Errors
    /// See [`CommandBuffer::remove_entities`].
    pub fn remove_entity(&mut self, id: EntityId, options: CommandOptions) -> Result<Vec<Entity>> {
        self.with_buffer(|buffer, es| buffer.remove_entity(es, id, options))
    }

    /// Removes entities as one batch.
    ///
    /// # Errors
    /// See [`CommandBuffer::remove_entities`].
    pub fn remove_entities(
        &mut self,
        ids: impl IntoIterator<Item = EntityId>,
        options: CommandOptions,
    ) -> Result<Vec<Entity>> {
        self.with_buffer(|buffer, es| buffer.remove_entities(es, ids, options))
    }

    /// Executes commands queued with `execute: false`.
    ///
    /// # Errors
    /// See [`CommandBuffer::execute`].
    pub fn flush(&mut self, options: CommandOptions) -> Result<ChangeSet> {
        self.with_buffer(|buffer, es| buffer.execute(es, options).cloned())
    }

    /// Returns the change set of the last executed batch.
    #[must_use]
    pub const fn last_changes(&self) -> &ChangeSet {
        self.buffer.changes()
    }

    /// Materializes components into one new entity, ignoring any entity
    /// ids they carry.
    ///
    /// # Errors
    /// See [`CommandBuffer::add_components`].
    pub fn add_raw_components(&mut self, components: Vec<Component>, options: CommandOptions) -> Result<Vec<Component>> {
        let entity = Entity::from_components(EntityId::NONE, components);
        self.add_entity(entity, options)?;
        Ok(self.buffer.changes().components_added.clone())
    }

    /// Removes every member whose signature matches `mask`.
    ///
    /// # Errors
    /// See [`CommandBuffer::remove_entities`].
    pub fn remove_by_def(&mut self, mask: &BitField, options: CommandOptions) -> Result<Vec<Entity>> {
        let ids: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| mask.matches(e.bit_field()))
            .map(Entity::id)
            .collect();
        self.remove_entities(ids, options)
    }

    // -------------------------------------------------------------------------
    // Ids
    // -------------------------------------------------------------------------

    /// Allocates a composite entity id in this set.
    ///
    /// # Errors
    /// Returns an internal error once the local id space is used up.
    pub fn create_entity_id(&mut self) -> Result<EntityId> {
        Ok(EntityId::compose(self.ids.entity_id()?, self.esid()))
    }

    /// Allocates a component id.
    ///
    /// # Errors
    /// Returns an internal error once the component id space is used up.
    pub fn create_component_id(&mut self) -> Result<ComponentId> {
        self.ids.component_id()
    }

    pub(crate) fn allocate_entity_ids(&mut self, count: usize) -> Result<Vec<u32>> {
        self.ids.entity_ids(count)
    }

    pub(crate) fn allocate_component_ids(&mut self, count: usize) -> Result<Vec<ComponentId>> {
        self.ids.component_ids(count)
    }

    // -------------------------------------------------------------------------
    // Applying change sets
    // -------------------------------------------------------------------------

    /// Merges a classified change set into storage and writes it through
    /// to an attached adapter. Does not publish events.
    ///
    /// # Errors
    /// Returns a storage error if the adapter rejects a write; in-memory
    /// state has been updated by then.
    pub fn update(&mut self, changes: &ChangeSet) -> Result<()> {
        for e in &changes.entities_added {
            self.ensure_entity(e.id());
        }
        for c in &changes.components_added {
            self.attach(c.clone());
        }
        for c in &changes.components_updated {
            let existing = self
                .entities
                .get_mut(&c.entity_id())
                .and_then(|e| e.component_mut(c.def_id()));
            match existing {
                Some(existing) => existing.apply(c.attributes()),
                None => self.attach(c.clone()),
            }
        }
        for c in &changes.components_removed {
            self.detach(c);
        }
        for e in &changes.entities_removed {
            self.drop_entity(e.id());
        }
        self.write_through(changes)
    }

    fn ensure_entity(&mut self, id: EntityId) {
        if !self.entities.contains_key(&id) {
            self.reserve(id);
            self.entities.insert(id, Entity::new(id));
        }
    }

    fn reserve(&mut self, id: EntityId) {
        if id.entity_set_id() == self.esid() {
            self.ids.reserve_entity_id(id.local_id());
        }
    }

    fn attach(&mut self, component: Component) {
        let entity_id = component.entity_id();
        self.ensure_entity(entity_id);
        self.ids.reserve_component_id(component.id());
        self.components
            .insert(component.id(), (entity_id, component.def_id()));
        if let Some(entity) = self.entities.get_mut(&entity_id) {
            if let Some(displaced) = entity.add_component(component) {
                if entity.component(displaced.def_id()).map(Component::id) != Some(displaced.id()) {
                    self.components.remove(&displaced.id());
                }
            }
        }
    }

    fn detach(&mut self, component: &Component) {
        if let Some(entity) = self.entities.get_mut(&component.entity_id()) {
            if let Some(removed) = entity.remove_component(component.def_id()) {
                self.components.remove(&removed.id());
            }
        }
    }

    fn drop_entity(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.remove(&id) {
            for c in entity.components() {
                self.components.remove(&c.id());
            }
            if id.entity_set_id() == self.esid() {
                self.ids.release_entity_id(id.local_id());
            }
        }
    }

    fn write_through(&self, changes: &ChangeSet) -> Result<()> {
        let Some(adapter) = &self.adapter else {
            return Ok(());
        };
        let mut adapter = lock(adapter)?;
        for e in &changes.entities_added {
            adapter.insert_entity(e.id())?;
        }
        for c in changes.components_added.iter().chain(&changes.components_updated) {
            if !adapter.has_def(c.def_id()) {
                if let Some(def) = self.registry.get(c.def_id()) {
                    adapter.register_def(def)?;
                }
            }
            let stored = self.component_by_entity(c.entity_id(), c.def_id()).unwrap_or(c);
            adapter.upsert_component(stored)?;
        }
        for c in &changes.components_removed {
            adapter.delete_component(c.entity_id(), c.def_id())?;
        }
        for e in &changes.entities_removed {
            adapter.delete_entity(e.id())?;
        }
        Ok(())
    }

    /// Publishes a change set's events to subscribers.
    pub fn publish_changes(&mut self, changes: &ChangeSet) {
        for event in changes.events() {
            trace!(event = event.name(), len = event.len(), "publishing");
            self.events.publish(&event);
        }
    }

    /// Returns a receiver for this set's change events.
    pub fn subscribe(&mut self) -> flume::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Attaches a storage adapter and writes the current contents to it.
    ///
    /// # Errors
    /// Returns a storage error if the adapter rejects a write.
    pub fn attach_adapter(&mut self, adapter: Box<dyn StorageAdapter>) -> Result<()> {
        let adapter = Arc::new(Mutex::new(adapter));
        {
            let mut guard = lock(&adapter)?;
            for def in self.registry.all_component_defs() {
                if !guard.has_def(def.id()) {
                    guard.register_def(def)?;
                }
            }
            for entity in self.entities.values() {
                guard.insert_entity(entity.id())?;
                for c in entity.components() {
                    guard.upsert_component(c)?;
                }
            }
        }
        self.adapter = Some(adapter);
        Ok(())
    }

    /// Reads an entity back from the attached adapter.
    ///
    /// # Errors
    /// Returns a storage error if there is no adapter or it fails.
    pub fn stored_components(&self, id: EntityId) -> Result<Vec<Component>> {
        let adapter = self
            .adapter
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::Storage("no adapter attached".into())))?;
        lock(adapter)?.components_for_entity(id)
    }

    // -------------------------------------------------------------------------
    // Filters
    // -------------------------------------------------------------------------

    /// Returns the membership filter.
    #[must_use]
    pub fn filter(&self) -> Option<&Arc<dyn EntityFilter>> {
        self.filter.as_ref()
    }

    /// Replaces the membership filter and removes members that fail it.
    ///
    /// Returns the removed entities.
    ///
    /// # Errors
    /// Returns an error if the filter cannot be evaluated.
    pub fn set_filter(&mut self, filter: Option<Arc<dyn EntityFilter>>) -> Result<Vec<Entity>> {
        self.filter = filter;
        self.evaluate_entities(None)
    }

    /// Returns true if the entity passes the filter (or there is none).
    ///
    /// # Errors
    /// Returns an error if the filter cannot be evaluated.
    pub fn is_entity_of_interest(&self, entity: &Entity) -> Result<bool> {
        match &self.filter {
            Some(filter) => filter.accepts(&self.registry, entity),
            None => Ok(true),
        }
    }

    /// Re-checks members (all, or those listed) against the filter and
    /// removes those that fail. Returns the removed entities.
    ///
    /// # Errors
    /// Returns an error if the filter cannot be evaluated.
    pub fn evaluate_entities(&mut self, ids: Option<&[EntityId]>) -> Result<Vec<Entity>> {
        if self.filter.is_none() {
            return Ok(Vec::new());
        }
        let candidates: Vec<EntityId> = match ids {
            Some(ids) => ids.iter().filter_map(|id| self.entity(*id).map(Entity::id)).collect(),
            None => self.entity_ids(),
        };
        let mut failing = Vec::new();
        for id in candidates {
            if let Some(entity) = self.entities.get(&id) {
                if !self.is_entity_of_interest(entity)? {
                    failing.push(id);
                }
            }
        }
        if failing.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = failing.len(), "removing entities rejected by filter");
        self.remove_entities(failing, CommandOptions::default())
    }

    /// Replaces all members with `entities`, keeping only those that pass
    /// the filter. Ids are taken as given. No events are published.
    ///
    /// # Errors
    /// Returns an error if the filter cannot be evaluated.
    pub fn reset(&mut self, entities: impl IntoIterator<Item = Entity>) -> Result<()> {
        self.entities = OrdMap::new();
        self.components.clear();
        self.buffer.reset();
        for entity in entities {
            if !self.is_entity_of_interest(&entity)? {
                continue;
            }
            self.reserve(entity.id());
            for c in entity.components() {
                self.ids.reserve_component_id(c.id());
                self.components.insert(c.id(), (entity.id(), c.def_id()));
            }
            self.entities.insert(entity.id(), entity);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Hashing and serialization
    // -------------------------------------------------------------------------

    /// Serializes the members as a list of entity JSON objects.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.entities
                .values()
                .map(|e| e.to_json(|d| self.registry.uri_of(d).map(str::to_string)))
                .collect(),
        )
    }

    /// Content hash of the set: its uuid, every component and the filter.
    #[must_use]
    pub fn hash(&self) -> u32 {
        let components: Vec<serde_json::Value> = self
            .components()
            .map(|c| c.to_json(self.registry.uri_of(c.def_id())))
            .collect();
        let json = serde_json::json!({
            "uuid": self.uuid.to_string(),
            "@e": components,
        });
        let mut text = json.to_string();
        if let Some(filter) = &self.filter {
            text.push_str(&hash::hash_to_string(filter.hash()));
        }
        hash::hash_str(&text)
    }
}

impl Clone for EntitySet {
    fn clone(&self) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            config: self.config.clone(),
            registry: self.registry.clone(),
            entities: self.entities.clone(),
            components: self.components.clone(),
            ids: self.ids.clone(),
            filter: self.filter.clone(),
            events: self.events.clone(),
            adapter: self.adapter.clone(),
            buffer: self.buffer.clone(),
        }
    }
}

impl Default for EntitySet {
    fn default() -> Self {
        Self::new(EntitySetConfig::default())
    }
}

impl fmt::Debug for EntitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySet")
            .field("uuid", &self.uuid)
            .field("esid", &self.config.esid)
            .field("entities", &self.entities.len())
            .field("components", &self.components.len())
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

fn lock(adapter: &Mutex<Box<dyn StorageAdapter>>) -> Result<MutexGuard<'_, Box<dyn StorageAdapter>>> {
    adapter
        .lock()
        .map_err(|_| Error::internal("storage adapter lock poisoned"))
}
