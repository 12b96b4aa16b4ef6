//! What a query reads from.

use cairn_foundation::{BitField, EntityId};
use cairn_storage::{ComponentRegistry, Entity, EntitySet};

/// Read access a query needs: a registry to resolve defs and entities by
/// id in ascending order.
pub trait QuerySource {
    /// Returns the def registry.
    fn registry(&self) -> &ComponentRegistry;

    /// Returns the entity with this id.
    fn entity(&self, id: EntityId) -> Option<&Entity>;

    /// Iterates entities in ascending id order.
    fn entities(&self) -> Box<dyn Iterator<Item = &Entity> + '_>;

    /// Returns the ids of entities whose signature matches `mask`,
    /// ascending. `None` or the wildcard mask selects every entity.
    fn match_entities(&self, mask: Option<&BitField>) -> Vec<EntityId> {
        self.entities()
            .filter(|e| mask.is_none_or(|m| m.matches(e.bit_field())))
            .map(Entity::id)
            .collect()
    }
}

impl QuerySource for EntitySet {
    fn registry(&self) -> &ComponentRegistry {
        EntitySet::registry(self)
    }

    fn entity(&self, id: EntityId) -> Option<&Entity> {
        EntitySet::entity(self, id)
    }

    fn entities(&self) -> Box<dyn Iterator<Item = &Entity> + '_> {
        Box::new(EntitySet::entities(self))
    }
}

/// A source holding exactly one entity, used to test membership.
#[derive(Debug, Clone, Copy)]
pub struct SingleEntity<'a> {
    registry: &'a ComponentRegistry,
    entity: &'a Entity,
}

impl<'a> SingleEntity<'a> {
    /// Wraps one entity.
    #[must_use]
    pub const fn new(registry: &'a ComponentRegistry, entity: &'a Entity) -> Self {
        Self { registry, entity }
    }
}

impl QuerySource for SingleEntity<'_> {
    fn registry(&self) -> &ComponentRegistry {
        self.registry
    }

    fn entity(&self, id: EntityId) -> Option<&Entity> {
        (id == self.entity.id()).then_some(self.entity)
    }

    fn entities(&self) -> Box<dyn Iterator<Item = &Entity> + '_> {
        Box::new(std::iter::once(self.entity))
    }
}
