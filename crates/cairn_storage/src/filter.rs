//! Membership filters.

use std::fmt;

use cairn_foundation::{BitField, Result, hash};

use crate::entity::Entity;
use crate::registry::ComponentRegistry;

/// A predicate constraining which entities may belong to an entity set.
///
/// Queries implement this in the query layer; a [`BitField`] mask is the
/// simplest filter and matches on component signature alone.
pub trait EntityFilter: Send + Sync + fmt::Debug {
    /// Returns true if the entity may be a member.
    ///
    /// # Errors
    /// Returns an error if the predicate cannot be evaluated.
    fn accepts(&self, registry: &ComponentRegistry, entity: &Entity) -> Result<bool>;

    /// Content hash of the predicate, folded into the set's hash.
    fn hash(&self) -> u32;
}

impl EntityFilter for BitField {
    fn accepts(&self, _registry: &ComponentRegistry, entity: &Entity) -> Result<bool> {
        Ok(self.matches(entity.bit_field()))
    }

    fn hash(&self) -> u32 {
        hash::hash_str(&format!("{self:?}"))
    }
}
