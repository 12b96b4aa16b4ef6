//! Entity set configuration.

use cairn_foundation::{ComponentId, EntityId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for an [`EntitySet`](crate::EntitySet).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntitySetConfig {
    /// Entity-set id embedded in every entity id this set allocates.
    pub esid: u32,
    /// Keep entities whose last component was removed.
    pub allow_empty_entities: bool,
    /// First local entity id handed out.
    pub entity_id_start: u32,
    /// First component id handed out.
    pub component_id_start: ComponentId,
    /// Hand out ids of removed entities again.
    pub reuse_entity_ids: bool,
}

impl Default for EntitySetConfig {
    fn default() -> Self {
        Self {
            esid: 1,
            allow_empty_entities: false,
            entity_id_start: 1,
            component_id_start: 1,
            reuse_entity_ids: false,
        }
    }
}

impl EntitySetConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the entity-set id. Values are masked to the packed range.
    #[must_use]
    pub fn with_esid(mut self, esid: u32) -> Self {
        self.esid = esid & EntityId::MAX_ENTITY_SET_ID;
        self
    }

    /// Keeps or removes entities that become empty.
    #[must_use]
    pub fn with_allow_empty_entities(mut self, allow: bool) -> Self {
        self.allow_empty_entities = allow;
        self
    }

    /// Sets the first local entity id.
    #[must_use]
    pub fn with_entity_id_start(mut self, start: u32) -> Self {
        self.entity_id_start = start;
        self
    }

    /// Sets the first component id.
    #[must_use]
    pub fn with_component_id_start(mut self, start: ComponentId) -> Self {
        self.component_id_start = start;
        self
    }

    /// Enables reuse of removed entity ids.
    #[must_use]
    pub fn with_reuse_entity_ids(mut self, reuse: bool) -> Self {
        self.reuse_entity_ids = reuse;
        self
    }
}
