//! Command buffers.
//!
//! A command buffer collects add/remove intents keyed by entity id, then
//! executes them as one batch: each entity's commands are replayed in order
//! against a working copy, the before/after states are classified into a
//! [`ChangeSet`], real ids replace provisional ones, and the change set is
//! merged into the entity set and published.
//!
//! Queueing and classification are shared by [`CommandBuffer`] and
//! [`AsyncCommandBuffer`]; they differ only in where ids come from.

mod asynchronous;
mod sync;

pub use asynchronous::AsyncCommandBuffer;
pub use sync::CommandBuffer;

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use cairn_foundation::{ComponentDefId, ComponentId, EntityId, Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::entity::Entity;
use crate::entity_set::EntitySet;
use crate::events::ChangeEvent;

// =============================================================================
// Commands and options
// =============================================================================

/// A queued intent against one entity.
///
/// Entity updates have no command of their own: an existing entity touched
/// by component commands and not removed is reported as updated.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Materialize the entity. Always first in its list, at most once.
    EntityAdd,
    /// Remove the entity outright.
    EntityRemove,
    /// Attach a component.
    ComponentAdd(Component),
    /// Detach the entity's component of this component's def.
    ComponentRemove(Component),
    /// Merge attributes onto the entity's component of this def.
    ComponentUpdate(Component),
}

/// Options accepted by every buffer operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CommandOptions {
    /// Execute immediately. When false, commands accumulate until the next
    /// executing call or an explicit flush.
    pub execute: bool,
    /// Suppress change events.
    pub silent: bool,
    /// Log each classified batch at debug level.
    pub debug: bool,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            execute: true,
            silent: false,
            debug: false,
        }
    }
}

impl CommandOptions {
    /// Returns the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that queue without executing.
    #[must_use]
    pub fn deferred() -> Self {
        Self::default().with_execute(false)
    }

    /// Sets whether to execute immediately.
    #[must_use]
    pub fn with_execute(mut self, execute: bool) -> Self {
        self.execute = execute;
        self
    }

    /// Sets whether to suppress events.
    #[must_use]
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Sets whether to log batches.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// A component to remove: an instance or a stored component's id.
#[derive(Clone, Debug, PartialEq)]
pub enum ComponentTarget {
    /// A component instance.
    Component(Component),
    /// The id of a component stored in the entity set.
    Id(ComponentId),
}

impl From<Component> for ComponentTarget {
    fn from(component: Component) -> Self {
        Self::Component(component)
    }
}

impl From<&Component> for ComponentTarget {
    fn from(component: &Component) -> Self {
        Self::Component(component.clone())
    }
}

impl From<ComponentId> for ComponentTarget {
    fn from(id: ComponentId) -> Self {
        Self::Id(id)
    }
}

// =============================================================================
// ChangeSet
// =============================================================================

/// The six collections a batch is classified into.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    /// Entities that did not exist before the batch.
    pub entities_added: Vec<Entity>,
    /// Existing entities whose components changed (post-change state).
    pub entities_updated: Vec<Entity>,
    /// Entities removed (pre-removal state).
    pub entities_removed: Vec<Entity>,
    /// Components attached.
    pub components_added: Vec<Component>,
    /// Components whose slot was rewritten.
    pub components_updated: Vec<Component>,
    /// Components detached.
    pub components_removed: Vec<Component>,
}

impl ChangeSet {
    /// Returns true if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities_added.is_empty()
            && self.entities_updated.is_empty()
            && self.entities_removed.is_empty()
            && self.components_added.is_empty()
            && self.components_updated.is_empty()
            && self.components_removed.is_empty()
    }

    /// Returns the sizes as `(entities added, updated, removed, components
    /// added, updated, removed)`.
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize, usize, usize, usize) {
        (
            self.entities_added.len(),
            self.entities_updated.len(),
            self.entities_removed.len(),
            self.components_added.len(),
            self.components_updated.len(),
            self.components_removed.len(),
        )
    }

    /// Returns the added and updated components.
    #[must_use]
    pub fn added_or_updated_components(&self) -> Vec<Component> {
        self.components_added
            .iter()
            .chain(&self.components_updated)
            .cloned()
            .collect()
    }

    /// Returns the non-empty events in emission order: component change,
    /// component remove, entity remove, component add, entity change,
    /// entity add. Removals reach listeners before additions.
    #[must_use]
    pub fn events(&self) -> Vec<ChangeEvent> {
        [
            ChangeEvent::ComponentChange(self.components_updated.clone()),
            ChangeEvent::ComponentRemove(self.components_removed.clone()),
            ChangeEvent::EntityRemove(self.entities_removed.clone()),
            ChangeEvent::ComponentAdd(self.components_added.clone()),
            ChangeEvent::EntityChange(self.entities_updated.clone()),
            ChangeEvent::EntityAdd(self.entities_added.clone()),
        ]
        .into_iter()
        .filter(|e| !e.is_empty())
        .collect()
    }

    fn from_deltas(deltas: Vec<EntityDelta>) -> Self {
        let mut changes = Self::default();
        for delta in deltas {
            match (delta.before, delta.after) {
                (None, Some(after)) => {
                    changes.components_added.extend(after.components().cloned());
                    changes.entities_added.push(after);
                }
                (Some(before), None) => {
                    changes
                        .components_removed
                        .extend(before.components().cloned());
                    changes.entities_removed.push(before);
                }
                (Some(before), Some(after)) => {
                    let mut changed = false;
                    for c in after.components() {
                        if !before.has(c.def_id()) {
                            changes.components_added.push(c.clone());
                            changed = true;
                        } else if delta.touched.contains(&c.def_id()) {
                            changes.components_updated.push(c.clone());
                            changed = true;
                        }
                    }
                    for c in before.components() {
                        if !after.has(c.def_id()) {
                            changes.components_removed.push(c.clone());
                            changed = true;
                        }
                    }
                    if changed {
                        changes.entities_updated.push(after);
                    }
                }
                (None, None) => {}
            }
        }
        changes
    }
}

// =============================================================================
// Queue and classification
// =============================================================================

/// Before and after states of one entity key.
#[derive(Debug)]
struct EntityDelta {
    key: EntityId,
    before: Option<Entity>,
    after: Option<Entity>,
    /// Defs written by add/update commands.
    touched: BTreeSet<ComponentDefId>,
}

impl EntityDelta {
    fn needs_entity_id(&self, esid: u32, rehome_foreign: bool) -> bool {
        self.before.is_none()
            && self.after.is_some()
            && (self.key.is_none()
                || self.key.is_provisional()
                || (rehome_foreign && self.key.entity_set_id() != esid))
    }

    fn missing_component_ids(&self) -> usize {
        self.after
            .as_ref()
            .map_or(0, |e| e.components().filter(|c| c.id() == 0).count())
    }
}

/// Commands keyed by entity id, shared by both buffer flavours.
#[derive(Clone, Debug, Default)]
struct CommandQueue {
    cmds: BTreeMap<EntityId, Vec<Command>>,
    /// Provisional entity collecting components queued without an owner.
    loose_entity: Option<EntityId>,
    next_provisional: u32,
}

impl CommandQueue {
    fn clear(&mut self) {
        self.cmds.clear();
        self.loose_entity = None;
    }

    fn len(&self) -> usize {
        self.cmds.values().map(Vec::len).sum()
    }

    fn provisional_id(&mut self) -> EntityId {
        self.next_provisional = self.next_provisional.wrapping_add(1).max(1);
        EntityId::provisional(self.next_provisional)
    }

    fn push(&mut self, key: EntityId, command: Command) {
        let list = self.cmds.entry(key).or_default();
        if command == Command::EntityAdd {
            if list.first() != Some(&Command::EntityAdd) {
                list.insert(0, command);
            }
        } else {
            list.push(command);
        }
    }

    fn queue_component(&mut self, es: &EntitySet, mut component: Component) -> Result<()> {
        if component.def_id() == 0 {
            return Err(Error::invalid_argument("argument is not component instance"));
        }

        let mut entity_id = component.entity_id();

        if component.id() != 0 {
            if let Some(existing) = es.component(component.id()) {
                if entity_id.is_none() {
                    entity_id = existing.entity_id();
                } else if existing.entity_id() != entity_id {
                    trace!(component = component.id(), from = %existing.entity_id(), to = %entity_id, "moving component");
                    self.push(
                        existing.entity_id(),
                        Command::ComponentRemove(existing.clone()),
                    );
                }
            }
        }

        if entity_id.is_none() {
            entity_id = match self.loose_entity {
                Some(id) => id,
                None => {
                    let id = self.provisional_id();
                    self.loose_entity = Some(id);
                    id
                }
            };
        }

        match es.entity(entity_id) {
            None => {
                component.set_entity_id(entity_id);
                self.push(entity_id, Command::EntityAdd);
                self.push(entity_id, Command::ComponentAdd(component));
            }
            Some(entity) => {
                let key = entity.id();
                component.set_entity_id(key);
                if entity.has(component.def_id()) {
                    self.push(key, Command::ComponentUpdate(component));
                } else {
                    self.push(key, Command::ComponentAdd(component));
                }
            }
        }
        Ok(())
    }

    fn queue_remove_component(&mut self, es: &EntitySet, target: ComponentTarget) {
        let component = match target {
            ComponentTarget::Id(id) => es.component(id).cloned(),
            ComponentTarget::Component(c) if c.id() != 0 => {
                Some(es.component(c.id()).cloned().unwrap_or(c))
            }
            ComponentTarget::Component(c) => Some(c),
        };
        let Some(component) = component else {
            return;
        };
        if component.entity_id().is_none() {
            return;
        }
        let key = es
            .entity(component.entity_id())
            .map_or(component.entity_id(), Entity::id);
        self.push(key, Command::ComponentRemove(component));
    }

    fn queue_entity(&mut self, es: &EntitySet, entity: Entity) -> Result<()> {
        let allow_empty = es.config().allow_empty_entities;
        if entity.is_empty() && !allow_empty {
            return Err(Error::invalid_argument(format!(
                "entity instance not passed: entity {} has no components",
                entity.id()
            )));
        }

        let id = if entity.id().is_none() {
            self.provisional_id()
        } else {
            entity.id()
        };

        if entity.is_empty() {
            if es.entity(id).is_none() {
                self.push(id, Command::EntityAdd);
            }
            return Ok(());
        }

        for c in entity.components() {
            self.queue_component(es, c.clone().with_entity_id(id))?;
        }

        if let Some(existing) = es.entity(id) {
            for c in existing.components() {
                if !entity.has(c.def_id()) {
                    self.push(existing.id(), Command::ComponentRemove(c.clone()));
                }
            }
        }
        Ok(())
    }

    fn queue_remove_entity(&mut self, es: &EntitySet, id: EntityId) {
        let Some(existing) = es.entity(id) else {
            return;
        };
        let key = existing.id();
        for c in existing.components() {
            self.push(key, Command::ComponentRemove(c.clone()));
        }
        self.push(key, Command::EntityRemove);
    }

    /// Replays each key's commands against a working copy of its entity.
    fn plan(&self, es: &EntitySet) -> Result<Vec<EntityDelta>> {
        let allow_empty = es.config().allow_empty_entities;
        let mut deltas = Vec::with_capacity(self.cmds.len());

        for (key, cmds) in &self.cmds {
            let before = es.entity(*key).cloned();
            let mut after = before.clone();
            let mut touched = BTreeSet::new();

            for cmd in cmds {
                match cmd {
                    Command::EntityAdd => {
                        if after.is_none() {
                            after = Some(Entity::new(*key));
                        }
                    }
                    Command::EntityRemove => after = None,
                    Command::ComponentAdd(c) => {
                        let Some(entity) = after.as_mut() else {
                            trace!(entity = %key, "component add for removed entity skipped");
                            continue;
                        };
                        let mut com = c.clone();
                        if com.id() == 0 {
                            if let Some(occupying) = entity.component(com.def_id()) {
                                com.set_id(occupying.id());
                            }
                        }
                        touched.insert(com.def_id());
                        entity.add_component(com);
                    }
                    Command::ComponentUpdate(c) => {
                        let Some(entity) = after.as_mut() else {
                            continue;
                        };
                        touched.insert(c.def_id());
                        match entity.component_mut(c.def_id()) {
                            Some(existing) => existing.apply(c.attributes()),
                            None => {
                                entity.add_component(c.clone());
                            }
                        }
                    }
                    Command::ComponentRemove(c) => {
                        if let Some(entity) = after.as_mut() {
                            entity.remove_component(c.def_id());
                        }
                    }
                }
            }

            if after.as_ref().is_some_and(Entity::is_empty) && !allow_empty {
                after = None;
            }
            if let (Some(entity), Some(filter)) = (&after, es.filter()) {
                if !filter.accepts(es.registry(), entity)? {
                    trace!(entity = %key, "entity rejected by filter");
                    after = None;
                }
            }

            deltas.push(EntityDelta {
                key: *key,
                before,
                after,
                touched,
            });
        }
        Ok(deltas)
    }
}

/// Counts the entity and component ids a plan needs.
fn ids_needed(deltas: &[EntityDelta], esid: u32, rehome_foreign: bool) -> (usize, usize) {
    let entities = deltas
        .iter()
        .filter(|d| d.needs_entity_id(esid, rehome_foreign))
        .count();
    let components = deltas.iter().map(EntityDelta::missing_component_ids).sum();
    (entities, components)
}

/// Replaces provisional entity ids and zero component ids with real ones.
fn assign_ids(
    deltas: &mut [EntityDelta],
    entity_ids: Vec<u32>,
    component_ids: Vec<ComponentId>,
    esid: u32,
    rehome_foreign: bool,
) -> Result<()> {
    let exhausted = || Error::internal("id allocator returned too few ids");
    let mut entity_ids = entity_ids.into_iter();
    let mut component_ids = component_ids.into_iter();

    for delta in deltas.iter_mut() {
        let needs_id = delta.needs_entity_id(esid, rehome_foreign);
        let is_new = delta.before.is_none();
        let key = delta.key;
        let Some(after) = delta.after.as_mut() else {
            continue;
        };

        if needs_id {
            let local = entity_ids.next().ok_or_else(exhausted)?;
            after.set_id(EntityId::compose(local, esid));
        } else if is_new && key.entity_set_id() == 0 {
            after.set_id(key.with_entity_set_id(esid));
        }

        let missing: Vec<ComponentDefId> = after
            .components()
            .filter(|c| c.id() == 0)
            .map(Component::def_id)
            .collect();
        for def_id in missing {
            let id = component_ids.next().ok_or_else(exhausted)?;
            if let Some(c) = after.component_mut(def_id) {
                c.set_id(id);
            }
        }
    }
    Ok(())
}
