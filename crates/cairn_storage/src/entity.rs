//! Entities: an id plus one component per def.
//!
//! The bitfield is the entity's component signature and is kept in step with
//! the component map: bit `d` is set iff a component of def `d` is present.

use im::OrdMap;

use cairn_foundation::{BitField, ComponentDefId, EntityId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::component::Component;

/// An entity and the components it owns, keyed by def id.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entity {
    id: EntityId,
    bit_field: BitField,
    components: OrdMap<ComponentDefId, Component>,
}

impl Entity {
    /// Creates an empty entity.
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Creates an entity owning the given components. A later component of
    /// the same def replaces an earlier one.
    #[must_use]
    pub fn from_components(id: EntityId, components: impl IntoIterator<Item = Component>) -> Self {
        let mut entity = Self::new(id);
        for c in components {
            entity.add_component(c);
        }
        entity
    }

    /// Returns the id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Re-identifies the entity and every component it owns.
    pub fn set_id(&mut self, id: EntityId) {
        self.id = id;
        let def_ids: Vec<ComponentDefId> = self.components.keys().copied().collect();
        for def_id in def_ids {
            if let Some(c) = self.components.get_mut(&def_id) {
                c.set_entity_id(id);
            }
        }
    }

    /// Returns the component signature.
    #[must_use]
    pub const fn bit_field(&self) -> &BitField {
        &self.bit_field
    }

    /// Returns the number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if the entity has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns the component of a def.
    #[must_use]
    pub fn component(&self, def_id: ComponentDefId) -> Option<&Component> {
        self.components.get(&def_id)
    }

    pub(crate) fn component_mut(&mut self, def_id: ComponentDefId) -> Option<&mut Component> {
        self.components.get_mut(&def_id)
    }

    /// Returns true if the entity has a component of the def.
    #[must_use]
    pub fn has(&self, def_id: ComponentDefId) -> bool {
        self.components.contains_key(&def_id)
    }

    /// Iterates components in def-id order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    /// Attaches a component, returning the one it displaced.
    pub fn add_component(&mut self, mut component: Component) -> Option<Component> {
        component.set_entity_id(self.id);
        let def_id = component.def_id();
        // def ids come from the registry and are always in bitfield range
        let _ = self.bit_field.set(def_id);
        self.components.insert(def_id, component)
    }

    /// Detaches the component of a def.
    pub fn remove_component(&mut self, def_id: ComponentDefId) -> Option<Component> {
        let removed = self.components.remove(&def_id);
        if removed.is_some() {
            self.bit_field.unset(def_id);
        }
        removed
    }

    /// Returns a copy carrying only the id and signature.
    #[must_use]
    pub fn signature(&self) -> Self {
        Self {
            id: self.id,
            bit_field: self.bit_field.clone(),
            components: OrdMap::new(),
        }
    }

    /// Returns the flat JSON form: the list of component objects.
    #[must_use]
    pub fn to_json(&self, def_uri: impl Fn(ComponentDefId) -> Option<String>) -> serde_json::Value {
        self.components
            .values()
            .map(|c| c.to_json(def_uri(c.def_id()).as_deref()))
            .collect()
    }
}
