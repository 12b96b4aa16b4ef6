//! Read-only views over an entity set.
//!
//! A [`ReadOnlyView`] holds the members of a source set that pass a filter.
//! It follows the source through its change events: each event names the
//! entities it touched, and those entities are re-checked against the
//! source when the view applies them. With `defer_events`, touched ids
//! accumulate across syncs until [`ReadOnlyView::apply_events`] is called.
//!
//! The view never mutates itself through its mutation methods; they are
//! forwarded to the source, and the view catches up on the next sync.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};
use uuid::Uuid;

use cairn_foundation::{EntityId, Error, Result, hash};
use cairn_storage::{
    ChangeEvent, ChangeSet, CommandOptions, Component, ComponentTarget, Entity, EntityFilter,
    EntitySet, EventBus,
};

use crate::config::ViewConfig;

/// A filtered, event-synchronized copy of part of an entity set.
pub struct ReadOnlyView {
    source_uuid: Uuid,
    filter: Option<Arc<dyn EntityFilter>>,
    config: ViewConfig,
    receiver: flume::Receiver<ChangeEvent>,
    order: Vec<EntityId>,
    positions: HashMap<EntityId, usize>,
    entities: HashMap<EntityId, Entity>,
    pending: BTreeSet<EntityId>,
    events: EventBus<ChangeEvent>,
}

impl ReadOnlyView {
    /// Creates a view of `source`, subscribing to its events and taking
    /// the current members that pass `filter` (all of them when `None`).
    ///
    /// # Errors
    /// Returns an error if the filter cannot be evaluated.
    pub fn new(
        source: &mut EntitySet,
        filter: Option<Arc<dyn EntityFilter>>,
        config: ViewConfig,
    ) -> Result<Self> {
        let receiver = source.subscribe();
        let mut view = Self {
            source_uuid: source.uuid(),
            filter,
            config,
            receiver,
            order: Vec::new(),
            positions: HashMap::new(),
            entities: HashMap::new(),
            pending: BTreeSet::new(),
            events: EventBus::new(),
        };
        for entity in source.entities() {
            if view.accepts(source, entity)? {
                view.insert(entity.clone());
            }
        }
        debug!(size = view.size(), query = %view.query_id(), "view created");
        Ok(view)
    }

    /// Returns the filter hash as hex, or `all` for an unfiltered view.
    #[must_use]
    pub fn query_id(&self) -> String {
        self.filter
            .as_ref()
            .map_or_else(|| "all".to_string(), |f| hash::hash_to_string(f.hash()))
    }

    /// Returns the uuid of the source set.
    #[must_use]
    pub const fn source_uuid(&self) -> Uuid {
        self.source_uuid
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Returns the number of members.
    #[must_use]
    pub fn size(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the view has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns the member at `index` in the view's order.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&Entity> {
        self.order.get(index).and_then(|id| self.entities.get(id))
    }

    /// Returns the member with this id.
    #[must_use]
    pub fn get_by_entity_id(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Returns the position of a member.
    #[must_use]
    pub fn position(&self, id: EntityId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Returns member ids in the view's order.
    #[must_use]
    pub fn entity_ids(&self) -> &[EntityId] {
        &self.order
    }

    /// Iterates members in the view's order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|id| self.entities.get(id))
    }

    /// Returns the number of touched entities awaiting `apply_events`.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Subscribes to the view's own add/remove events.
    pub fn subscribe(&mut self) -> flume::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    // -------------------------------------------------------------------------
    // Synchronization
    // -------------------------------------------------------------------------

    /// Drains the source's events and, unless deferring, applies them.
    ///
    /// Returns the number of membership changes applied.
    ///
    /// # Errors
    /// Returns an error if `source` is not this view's source or the filter
    /// fails.
    pub fn sync(&mut self, source: &EntitySet) -> Result<usize> {
        self.check_source(source)?;
        for event in self.receiver.try_iter() {
            trace!(event = event.name(), items = event.len(), "view received");
            match &event {
                ChangeEvent::EntityAdd(entities)
                | ChangeEvent::EntityRemove(entities)
                | ChangeEvent::EntityChange(entities) => {
                    self.pending.extend(entities.iter().map(Entity::id));
                }
                ChangeEvent::ComponentAdd(components)
                | ChangeEvent::ComponentRemove(components)
                | ChangeEvent::ComponentChange(components) => {
                    self.pending.extend(components.iter().map(Component::entity_id));
                }
            }
        }
        if self.config.defer_events {
            return Ok(0);
        }
        self.apply_events(source)
    }

    /// Re-checks every touched entity against the source and updates
    /// membership. Returns the number of entities added or removed.
    ///
    /// # Errors
    /// Returns an error if `source` is not this view's source or the filter
    /// fails.
    pub fn apply_events(&mut self, source: &EntitySet) -> Result<usize> {
        self.check_source(source)?;
        let touched = std::mem::take(&mut self.pending);
        let mut added = Vec::new();
        let mut removed = Vec::new();

        for id in touched {
            let current = match source.entity(id) {
                Some(entity) if self.accepts(source, entity)? => Some(entity),
                _ => None,
            };
            match (current, self.entities.contains_key(&id)) {
                (Some(entity), true) => {
                    self.entities.insert(id, entity.clone());
                }
                (Some(entity), false) => {
                    self.insert(entity.clone());
                    added.push(entity.clone());
                }
                (None, true) => {
                    if let Some(entity) = self.remove(id) {
                        removed.push(entity);
                    }
                }
                (None, false) => {}
            }
        }

        let applied = added.len() + removed.len();
        if applied > 0 {
            debug!(added = added.len(), removed = removed.len(), "view applied changes");
        }
        if self.config.emit_events {
            if !removed.is_empty() {
                self.events.publish(&ChangeEvent::EntityRemove(removed));
            }
            if !added.is_empty() {
                self.events.publish(&ChangeEvent::EntityAdd(added));
            }
        }
        Ok(applied)
    }

    fn accepts(&self, source: &EntitySet, entity: &Entity) -> Result<bool> {
        match &self.filter {
            Some(filter) => filter.accepts(source.registry(), entity),
            None => Ok(true),
        }
    }

    fn insert(&mut self, entity: Entity) {
        let id = entity.id();
        self.positions.insert(id, self.order.len());
        self.order.push(id);
        self.entities.insert(id, entity);
    }

    fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let index = self.positions.remove(&id)?;
        self.order.swap_remove(index);
        if let Some(moved) = self.order.get(index) {
            self.positions.insert(*moved, index);
        }
        self.entities.remove(&id)
    }

    fn check_source(&self, source: &EntitySet) -> Result<()> {
        if source.uuid() == self.source_uuid {
            Ok(())
        } else {
            Err(Error::invalid_argument(format!(
                "view of {} used with entity set {}",
                self.source_uuid,
                source.uuid()
            )))
        }
    }

    // -------------------------------------------------------------------------
    // Forwarded mutations
    // -------------------------------------------------------------------------

    /// Adds components to the source.
    ///
    /// # Errors
    /// Returns an error if `source` is not this view's source, or whatever
    /// the source fails with.
    pub fn add_components(
        &self,
        source: &mut EntitySet,
        components: impl IntoIterator<Item = Component>,
        options: CommandOptions,
    ) -> Result<Vec<Component>> {
        self.check_source(source)?;
        source.add_components(components, options)
    }

    /// Removes components from the source.
    ///
    /// # Errors
    /// See [`ReadOnlyView::add_components`].
    pub fn remove_components(
        &self,
        source: &mut EntitySet,
        targets: impl IntoIterator<Item = ComponentTarget>,
        options: CommandOptions,
    ) -> Result<Vec<Component>> {
        self.check_source(source)?;
        source.remove_components(targets, options)
    }

    /// Adds entities to the source.
    ///
    /// # Errors
    /// See [`ReadOnlyView::add_components`].
    pub fn add_entities(
        &self,
        source: &mut EntitySet,
        entities: impl IntoIterator<Item = Entity>,
        options: CommandOptions,
    ) -> Result<Vec<Entity>> {
        self.check_source(source)?;
        source.add_entities(entities, options)
    }

    /// Removes entities from the source.
    ///
    /// # Errors
    /// See [`ReadOnlyView::add_components`].
    pub fn remove_entities(
        &self,
        source: &mut EntitySet,
        ids: impl IntoIterator<Item = EntityId>,
        options: CommandOptions,
    ) -> Result<Vec<Entity>> {
        self.check_source(source)?;
        source.remove_entities(ids, options)
    }

    /// Flushes the source's deferred commands.
    ///
    /// # Errors
    /// See [`ReadOnlyView::add_components`].
    pub fn flush(&self, source: &mut EntitySet, options: CommandOptions) -> Result<ChangeSet> {
        self.check_source(source)?;
        source.flush(options)
    }
}

impl fmt::Debug for ReadOnlyView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyView")
            .field("source", &self.source_uuid)
            .field("query", &self.query_id())
            .field("size", &self.size())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
