use tracing::debug;

use cairn_foundation::{EntityId, Result};

use super::{ChangeSet, CommandOptions, CommandQueue, ComponentTarget, assign_ids, ids_needed};
use crate::component::Component;
use crate::entity::Entity;
use crate::entity_set::EntitySet;

/// Command buffer drawing ids synchronously from the entity set's own
/// allocator.
///
/// Every operation takes [`CommandOptions`]; with `execute` unset, commands
/// accumulate until the next executing call (or [`execute`](Self::execute)).
/// An executing call first discards any previous change set.
#[derive(Clone, Debug, Default)]
pub struct CommandBuffer {
    queue: CommandQueue,
    changes: ChangeSet,
}

impl CommandBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the change set of the last executed batch.
    #[must_use]
    pub const fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Returns the number of queued commands.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Discards queued commands and the last change set.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.changes = ChangeSet::default();
    }

    /// Queues one component. See [`add_components`](Self::add_components).
    ///
    /// # Errors
    /// Returns an error if the component has no def.
    pub fn add_component(
        &mut self,
        es: &mut EntitySet,
        component: Component,
        options: CommandOptions,
    ) -> Result<Vec<Component>> {
        self.add_components(es, [component], options)
    }

    /// Queues components for addition or update.
    ///
    /// Components without an entity id are gathered onto one new entity.
    /// Returns the added and updated components when executed.
    ///
    /// # Errors
    /// Returns an error if a component has no def, or if the filter or the
    /// storage adapter fails during execution.
    pub fn add_components(
        &mut self,
        es: &mut EntitySet,
        components: impl IntoIterator<Item = Component>,
        options: CommandOptions,
    ) -> Result<Vec<Component>> {
        if options.execute {
            self.changes = ChangeSet::default();
        }
        for component in components {
            self.queue.queue_component(es, component)?;
        }
        if !options.execute {
            return Ok(Vec::new());
        }
        Ok(self.execute(es, options)?.added_or_updated_components())
    }

    /// Queues one component removal.
    ///
    /// # Errors
    /// Returns an error if execution fails.
    pub fn remove_component(
        &mut self,
        es: &mut EntitySet,
        target: impl Into<ComponentTarget>,
        options: CommandOptions,
    ) -> Result<Vec<Component>> {
        self.remove_components(es, [target.into()], options)
    }

    /// Queues component removals. Unowned components are ignored.
    ///
    /// Returns the removed components when executed.
    ///
    /// # Errors
    /// Returns an error if execution fails.
    pub fn remove_components(
        &mut self,
        es: &mut EntitySet,
        targets: impl IntoIterator<Item = ComponentTarget>,
        options: CommandOptions,
    ) -> Result<Vec<Component>> {
        if options.execute {
            self.changes = ChangeSet::default();
        }
        for target in targets {
            self.queue.queue_remove_component(es, target);
        }
        if !options.execute {
            return Ok(Vec::new());
        }
        Ok(self.execute(es, options)?.components_removed.clone())
    }

    /// Queues one entity.
    ///
    /// # Errors
    /// See [`add_entities`](Self::add_entities).
    pub fn add_entity(
        &mut self,
        es: &mut EntitySet,
        entity: Entity,
        options: CommandOptions,
    ) -> Result<Vec<Entity>> {
        self.add_entities(es, [entity], options)
    }

    /// Queues entities. An existing entity is replaced: components it has
    /// and the new version lacks are removed.
    ///
    /// Returns the added entities when executed.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for an entity without components unless
    /// the set allows empty entities.
    pub fn add_entities(
        &mut self,
        es: &mut EntitySet,
        entities: impl IntoIterator<Item = Entity>,
        options: CommandOptions,
    ) -> Result<Vec<Entity>> {
        if options.execute {
            self.changes = ChangeSet::default();
        }
        for entity in entities {
            self.queue.queue_entity(es, entity)?;
        }
        if !options.execute {
            return Ok(Vec::new());
        }
        Ok(self.execute(es, options)?.entities_added.clone())
    }

    /// Queues one entity removal.
    ///
    /// # Errors
    /// Returns an error if execution fails.
    pub fn remove_entity(
        &mut self,
        es: &mut EntitySet,
        id: EntityId,
        options: CommandOptions,
    ) -> Result<Vec<Entity>> {
        self.remove_entities(es, [id], options)
    }

    /// Queues entity removals. Unknown ids are ignored.
    ///
    /// Returns the removed entities when executed.
    ///
    /// # Errors
    /// Returns an error if execution fails.
    pub fn remove_entities(
        &mut self,
        es: &mut EntitySet,
        ids: impl IntoIterator<Item = EntityId>,
        options: CommandOptions,
    ) -> Result<Vec<Entity>> {
        if options.execute {
            self.changes = ChangeSet::default();
        }
        for id in ids {
            self.queue.queue_remove_entity(es, id);
        }
        if !options.execute {
            return Ok(Vec::new());
        }
        Ok(self.execute(es, options)?.entities_removed.clone())
    }

    /// Classifies the queued commands, assigns ids, applies the result to
    /// the set and publishes it unless `options.silent`.
    ///
    /// The queue is emptied even when applying fails.
    ///
    /// # Errors
    /// Returns an error if the filter or the storage adapter fails.
    pub fn execute(&mut self, es: &mut EntitySet, options: CommandOptions) -> Result<&ChangeSet> {
        let esid = es.esid();
        let planned = self.queue.plan(es);
        self.queue.clear();
        let mut deltas = planned?;

        let (entity_count, component_count) = ids_needed(&deltas, esid, false);
        let entity_ids = es.allocate_entity_ids(entity_count)?;
        let component_ids = es.allocate_component_ids(component_count)?;
        assign_ids(&mut deltas, entity_ids, component_ids, esid, false)?;

        self.changes = ChangeSet::from_deltas(deltas);
        if options.debug {
            debug!(esid, counts = ?self.changes.counts(), "executing batch");
        }
        es.update(&self.changes)?;
        if !options.silent {
            es.publish_changes(&self.changes);
        }
        Ok(&self.changes)
    }
}
