//! Entity set fronted by an asynchronous id allocator.

use std::fmt;
use std::sync::Arc;

use cairn_foundation::{ComponentDefId, EntityId, Error, Result};

use crate::cmd_buffer::{AsyncCommandBuffer, ChangeSet, CommandOptions, ComponentTarget};
use crate::component::Component;
use crate::config::EntitySetConfig;
use crate::entity::Entity;
use crate::entity_set::EntitySet;
use crate::id::{AsyncIdAllocator, ReusableIdAllocator, SharedIdAllocator};

/// An [`EntitySet`] whose new entity and component ids come from an
/// [`AsyncIdAllocator`], such as a database sequence.
///
/// Incoming entities carrying another set's esid are re-identified.
pub struct AsyncEntitySet {
    inner: EntitySet,
    allocator: Arc<dyn AsyncIdAllocator>,
    buffer: AsyncCommandBuffer,
}

impl fmt::Debug for AsyncEntitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncEntitySet")
            .field("inner", &self.inner)
            .field("pending", &self.buffer.pending())
            .finish_non_exhaustive()
    }
}

impl AsyncEntitySet {
    /// Creates a set drawing ids from a [`SharedIdAllocator`] seeded with
    /// the config's start values.
    #[must_use]
    pub fn new(config: EntitySetConfig) -> Self {
        let allocator = SharedIdAllocator::new(
            ReusableIdAllocator::new(config.entity_id_start, config.component_id_start)
                .with_reuse(config.reuse_entity_ids),
        );
        Self::with_allocator(EntitySet::new(config), Arc::new(allocator))
    }

    /// Wraps an entity set with an allocator.
    #[must_use]
    pub fn with_allocator(inner: EntitySet, allocator: Arc<dyn AsyncIdAllocator>) -> Self {
        Self {
            inner,
            allocator,
            buffer: AsyncCommandBuffer::new(),
        }
    }

    /// Returns the wrapped set.
    #[must_use]
    pub const fn inner(&self) -> &EntitySet {
        &self.inner
    }

    /// Returns the wrapped set mutably, for registry and filter access.
    pub fn inner_mut(&mut self) -> &mut EntitySet {
        &mut self.inner
    }

    /// Returns the change set of the last executed batch.
    #[must_use]
    pub const fn last_changes(&self) -> &ChangeSet {
        self.buffer.changes()
    }

    /// Adds or updates a component.
    ///
    /// # Errors
    /// See [`AsyncCommandBuffer::add_components`].
    pub async fn add_component(&mut self, component: Component, options: CommandOptions) -> Result<Vec<Component>> {
        self.add_components([component], options).await
    }

    /// Adds or updates components as one batch.
    ///
    /// # Errors
    /// See [`AsyncCommandBuffer::add_components`].
    pub async fn add_components(
        &mut self,
        components: impl IntoIterator<Item = Component>,
        options: CommandOptions,
    ) -> Result<Vec<Component>> {
        self.buffer
            .add_components(&mut self.inner, self.allocator.as_ref(), components, options)
            .await
    }

    /// Removes a component.
    ///
    /// # Errors
    /// See [`AsyncCommandBuffer::remove_components`].
    pub async fn remove_component(
        &mut self,
        target: impl Into<ComponentTarget>,
        options: CommandOptions,
    ) -> Result<Vec<Component>> {
        self.remove_components([target.into()], options).await
    }

    /// Removes components as one batch.
    ///
    /// # Errors
    /// See [`AsyncCommandBuffer::remove_components`].
    pub async fn remove_components(
        &mut self,
        targets: impl IntoIterator<Item = ComponentTarget>,
        options: CommandOptions,
    ) -> Result<Vec<Component>> {
        self.buffer
            .remove_components(&mut self.inner, self.allocator.as_ref(), targets, options)
            .await
    }

    /// Adds or replaces an entity.
    ///
    /// # Errors
    /// See [`AsyncCommandBuffer::add_entities`].
    pub async fn add_entity(&mut self, entity: Entity, options: CommandOptions) -> Result<Vec<Entity>> {
        self.add_entities([entity], options).await
    }

    /// Adds or replaces entities as one batch.
    ///
    /// # Errors
    /// See [`AsyncCommandBuffer::add_entities`].
    pub async fn add_entities(
        &mut self,
        entities: impl IntoIterator<Item = Entity>,
        options: CommandOptions,
    ) -> Result<Vec<Entity>> {
        self.buffer
            .add_entities(&mut self.inner, self.allocator.as_ref(), entities, options)
            .await
    }

    /// Removes an entity.
    ///
    /// # Errors
    /// See [`AsyncCommandBuffer::remove_entities`].
    pub async fn remove_entity(&mut self, id: EntityId, options: CommandOptions) -> Result<Vec<Entity>> {
        self.remove_entities([id], options).await
    }

    /// Removes entities as one batch.
    ///
    /// # Errors
    /// See [`AsyncCommandBuffer::remove_entities`].
    pub async fn remove_entities(
        &mut self,
        ids: impl IntoIterator<Item = EntityId>,
        options: CommandOptions,
    ) -> Result<Vec<Entity>> {
        self.buffer
            .remove_entities(&mut self.inner, self.allocator.as_ref(), ids, options)
            .await
    }

    /// Executes commands queued with `execute: false`.
    ///
    /// # Errors
    /// See [`AsyncCommandBuffer::execute`].
    pub async fn flush(&mut self, options: CommandOptions) -> Result<ChangeSet> {
        self.buffer
            .execute(&mut self.inner, self.allocator.as_ref(), options)
            .await
            .cloned()
    }

    /// Returns the member with this id.
    ///
    /// # Errors
    /// Returns `EntityNotFound` when missing and `throws_on_error` is set.
    pub fn get_entity(&self, id: EntityId, throws_on_error: bool) -> Result<Option<&Entity>> {
        self.inner.get_entity(id, throws_on_error)
    }

    /// Returns an entity's component of a def.
    ///
    /// # Errors
    /// Returns `ComponentNotFound` when the entity lacks the def.
    pub fn component_by_entity(&self, entity_id: EntityId, def_id: ComponentDefId) -> Result<&Component> {
        self.inner
            .component_by_entity(entity_id, def_id)
            .ok_or_else(|| Error::component_slot_not_found(entity_id, def_id))
    }

    /// Returns id-and-bitfield copies of the requested entities.
    #[must_use]
    pub fn entity_signatures(&self, ids: &[EntityId]) -> Vec<Entity> {
        self.inner.entity_signatures(ids)
    }

    /// Returns the number of members.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.size()
    }
}
