//! Composite entity identifiers.
//!
//! An [`EntityId`] packs the id of the owning entity set into the bits above
//! a 32-bit local id, keeping the whole value within the 53 bits that survive
//! a round trip through an IEEE double:
//!
//! ```text
//! id = (esid & 0x1FFFFF) * 2^32 + (eid & 0xFFFFFFFF)
//! ```
//!
//! Provisional ids, used as command buffer keys before real ids exist, set
//! bit 53 and so never equal a packed id of any entity set.

use std::fmt;

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Numeric id of a registered component def, used as a bitfield index.
pub type ComponentDefId = u32;

/// Numeric id of a stored component.
pub type ComponentId = u64;

const LOCAL_MASK: u64 = 0xFFFF_FFFF;
const SET_MASK: u32 = 0x1F_FFFF;
const PROVISIONAL_BIT: u64 = 1 << 53;

/// Entity identifier packing an entity-set id and a local sequence number.
///
/// An id of 0 means "unassigned".
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityId(u64);

impl EntityId {
    /// The unassigned id.
    pub const NONE: Self = Self(0);

    /// Largest entity-set id that fits in the packed form.
    pub const MAX_ENTITY_SET_ID: u32 = SET_MASK;

    /// Packs a local id and entity-set id.
    #[must_use]
    pub const fn compose(local: u32, entity_set_id: u32) -> Self {
        Self(((entity_set_id & SET_MASK) as u64) << 32 | local as u64)
    }

    /// Wraps a raw packed value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Creates a provisional id, used as a command buffer key until a real
    /// id is allocated.
    #[must_use]
    pub const fn provisional(sequence: u32) -> Self {
        Self(PROVISIONAL_BIT | sequence as u64)
    }

    /// Returns the packed value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns the local (low 32 bit) portion.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn local_id(self) -> u32 {
        (self.0 & LOCAL_MASK) as u32
    }

    /// Returns the entity-set portion. Provisional ids belong to no set
    /// and report 0.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn entity_set_id(self) -> u32 {
        ((self.0 - (self.0 & LOCAL_MASK)) >> 32) as u32 & SET_MASK
    }

    /// Returns this id re-homed into another entity set.
    #[must_use]
    pub const fn with_entity_set_id(self, entity_set_id: u32) -> Self {
        Self::compose(self.local_id(), entity_set_id)
    }

    /// Returns true if this is the unassigned id.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Returns true if this id was handed out provisionally.
    #[must_use]
    pub const fn is_provisional(self) -> bool {
        self.0 & PROVISIONAL_BIT != 0
    }

    /// Encodes the packed value as eight big-endian bytes.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decodes eight big-endian bytes.
    ///
    /// # Errors
    /// Returns an error if the value uses bits above the 53-bit packed range.
    pub fn from_be_bytes(bytes: [u8; 8]) -> Result<Self> {
        let raw = u64::from_be_bytes(bytes);
        if raw >> 53 != 0 {
            return Err(Error::invalid_argument(format!(
                "entity id {raw} exceeds the packed range"
            )));
        }
        Ok(Self(raw))
    }
}

impl From<u64> for EntityId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<EntityId> for u64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "EntityId(none)")
        } else if self.is_provisional() {
            write!(f, "EntityId({}@provisional)", self.local_id())
        } else {
            write!(
                f,
                "EntityId({}@{})",
                self.local_id(),
                self.entity_set_id()
            )
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
