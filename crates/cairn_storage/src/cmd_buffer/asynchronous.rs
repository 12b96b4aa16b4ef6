use tracing::debug;

use cairn_foundation::{EntityId, Result};

use super::{ChangeSet, CommandOptions, CommandQueue, ComponentTarget, assign_ids, ids_needed};
use crate::component::Component;
use crate::entity::Entity;
use crate::entity_set::EntitySet;
use crate::id::AsyncIdAllocator;

/// Command buffer whose ids come from an [`AsyncIdAllocator`].
///
/// Classification matches [`CommandBuffer`](super::CommandBuffer), with one
/// difference: an incoming entity whose id belongs to another entity set is
/// treated as new and receives an id from the allocator.
#[derive(Clone, Debug, Default)]
pub struct AsyncCommandBuffer {
    queue: CommandQueue,
    changes: ChangeSet,
}

impl AsyncCommandBuffer {
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

    /// Queues components for addition or update.
    ///
    /// # Errors
    /// Returns an error if a component has no def, or if id allocation or
    /// applying fails.
    pub async fn add_components(
        &mut self,
        es: &mut EntitySet,
        ids: &dyn AsyncIdAllocator,
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
        Ok(self
            .execute(es, ids, options)
            .await?
            .added_or_updated_components())
    }

    /// Queues component removals. Unowned components are ignored.
    ///
    /// # Errors
    /// Returns an error if applying fails.
    pub async fn remove_components(
        &mut self,
        es: &mut EntitySet,
        ids: &dyn AsyncIdAllocator,
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
        Ok(self
            .execute(es, ids, options)
            .await?
            .components_removed
            .clone())
    }

    /// Queues entities, replacing existing versions.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for an entity without components unless
    /// the set allows empty entities.
    pub async fn add_entities(
        &mut self,
        es: &mut EntitySet,
        ids: &dyn AsyncIdAllocator,
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
        Ok(self.execute(es, ids, options).await?.entities_added.clone())
    }

    /// Queues entity removals. Unknown ids are ignored.
    ///
    /// # Errors
    /// Returns an error if applying fails.
    pub async fn remove_entities(
        &mut self,
        es: &mut EntitySet,
        ids: &dyn AsyncIdAllocator,
        entity_ids: impl IntoIterator<Item = EntityId>,
        options: CommandOptions,
    ) -> Result<Vec<Entity>> {
        if options.execute {
            self.changes = ChangeSet::default();
        }
        for id in entity_ids {
            self.queue.queue_remove_entity(es, id);
        }
        if !options.execute {
            return Ok(Vec::new());
        }
        Ok(self
            .execute(es, ids, options)
            .await?
            .entities_removed
            .clone())
    }

    /// Classifies the queued commands, awaits ids for new entities and
    /// components, then applies and publishes the batch.
    ///
    /// # Errors
    /// Returns an error if the filter, the allocator or the storage adapter
    /// fails.
    pub async fn execute(
        &mut self,
        es: &mut EntitySet,
        ids: &dyn AsyncIdAllocator,
        options: CommandOptions,
    ) -> Result<&ChangeSet> {
        let esid = es.esid();
        let planned = self.queue.plan(es);
        self.queue.clear();
        let mut deltas = planned?;

        let (entity_count, component_count) = ids_needed(&deltas, esid, true);
        let entity_ids = if entity_count > 0 {
            ids.entity_ids(entity_count).await?
        } else {
            Vec::new()
        };
        let component_ids = if component_count > 0 {
            ids.component_ids(component_count).await?
        } else {
            Vec::new()
        };
        assign_ids(&mut deltas, entity_ids, component_ids, esid, true)?;

        self.changes = ChangeSet::from_deltas(deltas);
        if options.debug {
            debug!(esid, counts = ?self.changes.counts(), "executing async batch");
        }
        es.update(&self.changes)?;
        if !options.silent {
            es.publish_changes(&self.changes);
        }
        Ok(&self.changes)
    }
}
