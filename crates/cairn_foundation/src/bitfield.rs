//! Component membership bitfields.
//!
//! A [`BitField`] is used two ways: as an entity's component signature (bit
//! `d` set iff the entity has a component of def `d`) and as a query mask,
//! where its [`MatchMode`] decides how it is compared against a signature.

use std::fmt;

use fixedbitset::FixedBitSet;

use crate::{ComponentDefId, Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Upper bound on component def ids a bitfield can hold.
pub const MAX_COMPONENT_DEFS: usize = 4096;

/// How a mask bitfield is compared against an entity signature.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MatchMode {
    /// Every bit of the mask must be present.
    #[default]
    And,
    /// At least one bit of the mask must be present.
    Or,
    /// No bit of the mask may be present.
    Not,
}

/// Fixed-capacity bit vector indexed by component def id.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BitField {
    bits: FixedBitSet,
    mode: MatchMode,
    all: bool,
}

impl BitField {
    /// Creates an empty bitfield.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the wildcard mask which matches every entity.
    #[must_use]
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    /// Creates a bitfield with the given def ids set.
    ///
    /// # Errors
    /// Returns an error if any id is outside the supported range.
    pub fn create(ids: impl IntoIterator<Item = ComponentDefId>) -> Result<Self> {
        let mut bf = Self::new();
        for id in ids {
            bf.set(id)?;
        }
        Ok(bf)
    }

    /// Returns this bitfield with a different match mode.
    #[must_use]
    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Returns the match mode.
    #[must_use]
    pub const fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Returns true if this is the wildcard mask.
    #[must_use]
    pub const fn is_all_set(&self) -> bool {
        self.all
    }

    /// Sets a bit.
    ///
    /// # Errors
    /// Returns an error if the id is outside the supported range.
    pub fn set(&mut self, id: ComponentDefId) -> Result<()> {
        let index = Self::index(id)?;
        if index >= self.bits.len() {
            self.bits.grow(index + 1);
        }
        self.bits.insert(index);
        Ok(())
    }

    /// Clears a bit. Out-of-range ids are ignored.
    pub fn unset(&mut self, id: ComponentDefId) {
        if let Ok(index) = Self::index(id) {
            if index < self.bits.len() {
                self.bits.set(index, false);
            }
        }
    }

    /// Returns true if the bit for `id` is set.
    #[must_use]
    pub fn get(&self, id: ComponentDefId) -> bool {
        Self::index(id).is_ok_and(|index| self.bits.contains(index))
    }

    /// Returns the number of set bits.
    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.count_ones(..)
    }

    /// Returns true if no bits are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Returns the set def ids in ascending order.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_values(&self) -> Vec<ComponentDefId> {
        self.bits.ones().map(|i| i as ComponentDefId).collect()
    }

    /// Returns true if every bit of `mask` is set in `bf`.
    #[must_use]
    pub fn and(mask: &Self, bf: &Self) -> bool {
        mask.bits.is_subset(&bf.bits)
    }

    /// Returns true if any bit of `mask` is set in `bf`.
    #[must_use]
    pub fn or(mask: &Self, bf: &Self) -> bool {
        !mask.bits.is_disjoint(&bf.bits)
    }

    /// Returns true if no bit of `mask` is set in `bf`.
    #[must_use]
    pub fn not(mask: &Self, bf: &Self) -> bool {
        mask.bits.is_disjoint(&bf.bits)
    }

    /// Compares this mask against an entity signature using its match mode.
    /// The wildcard mask matches everything.
    #[must_use]
    pub fn matches(&self, signature: &Self) -> bool {
        if self.all {
            return true;
        }
        match self.mode {
            MatchMode::And => Self::and(self, signature),
            MatchMode::Or => Self::or(self, signature),
            MatchMode::Not => Self::not(self, signature),
        }
    }

    fn index(id: ComponentDefId) -> Result<usize> {
        let index = id as usize;
        if index >= MAX_COMPONENT_DEFS {
            return Err(Error::invalid_argument(format!(
                "component def id {id} exceeds bitfield capacity {MAX_COMPONENT_DEFS}"
            )));
        }
        Ok(index)
    }
}

impl fmt::Debug for BitField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all {
            return write!(f, "BitField(all)");
        }
        write!(f, "BitField({:?} {:?})", self.mode, self.to_values())
    }
}
