//! Entity and component id allocation.
//!
//! Each entity set owns a [`ReusableIdAllocator`]. Local entity ids are
//! handed out from a free list when reuse is enabled, otherwise from a
//! monotonically increasing counter. Backends that allocate ids remotely
//! implement [`AsyncIdAllocator`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::lock::Mutex;

use cairn_foundation::{ComponentId, Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Counter-based id allocator with an optional free list for entity ids.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReusableIdAllocator {
    /// `None` once the local id space is used up.
    next_entity: Option<u32>,
    next_component: Option<ComponentId>,
    /// Released local entity ids available for reuse.
    free_list: Vec<u32>,
    reuse: bool,
}

impl Default for ReusableIdAllocator {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl ReusableIdAllocator {
    /// Creates an allocator whose first ids are the given starts. A start of
    /// 0 is bumped to 1, since 0 means "unassigned".
    #[must_use]
    pub fn new(entity_start: u32, component_start: ComponentId) -> Self {
        Self {
            next_entity: Some(entity_start.max(1)),
            next_component: Some(component_start.max(1)),
            free_list: Vec::new(),
            reuse: false,
        }
    }

    /// Enables or disables reuse of released entity ids.
    #[must_use]
    pub fn with_reuse(mut self, reuse: bool) -> Self {
        self.reuse = reuse;
        self
    }

    /// Allocates a local entity id.
    ///
    /// # Errors
    /// Returns an internal error once every local id up to `u32::MAX` has
    /// been handed out or reserved.
    pub fn entity_id(&mut self) -> Result<u32> {
        if self.reuse {
            if let Some(id) = self.free_list.pop() {
                return Ok(id);
            }
        }
        let id = self
            .next_entity
            .ok_or_else(|| Error::internal("local entity ids exhausted"))?;
        self.next_entity = id.checked_add(1);
        Ok(id)
    }

    /// Allocates `count` local entity ids.
    ///
    /// # Errors
    /// Returns an internal error if the id space runs out part way.
    pub fn entity_ids(&mut self, count: usize) -> Result<Vec<u32>> {
        (0..count).map(|_| self.entity_id()).collect()
    }

    /// Allocates a component id.
    ///
    /// # Errors
    /// Returns an internal error once the component id space is used up.
    pub fn component_id(&mut self) -> Result<ComponentId> {
        let id = self
            .next_component
            .ok_or_else(|| Error::internal("component ids exhausted"))?;
        self.next_component = id.checked_add(1);
        Ok(id)
    }

    /// Allocates `count` component ids.
    ///
    /// # Errors
    /// Returns an internal error if the id space runs out part way.
    pub fn component_ids(&mut self, count: usize) -> Result<Vec<ComponentId>> {
        (0..count).map(|_| self.component_id()).collect()
    }

    /// Returns a local entity id to the pool. Ignored unless reuse is on.
    pub fn release_entity_id(&mut self, id: u32) {
        let handed_out = self.next_entity.is_none_or(|next| id < next);
        if self.reuse && id != 0 && handed_out && !self.free_list.contains(&id) {
            self.free_list.push(id);
        }
    }

    /// Marks an externally chosen local entity id as taken. The counter
    /// moves past it, so it is never handed out again.
    pub fn reserve_entity_id(&mut self, id: u32) {
        if self.next_entity.is_some_and(|next| id >= next) {
            self.next_entity = id.checked_add(1);
        }
        self.free_list.retain(|f| *f != id);
    }

    /// Marks an externally chosen component id as taken.
    pub fn reserve_component_id(&mut self, id: ComponentId) {
        if self.next_component.is_some_and(|next| id >= next) {
            self.next_component = id.checked_add(1);
        }
    }

    /// Returns the number of ids waiting for reuse.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }
}

/// An id source that may need a round trip (to a database sequence or
/// remote service) before ids are known.
#[async_trait]
pub trait AsyncIdAllocator: Send + Sync {
    /// Allocates `count` local entity ids.
    ///
    /// # Errors
    /// Returns an error if the backing source fails.
    async fn entity_ids(&self, count: usize) -> Result<Vec<u32>>;

    /// Allocates `count` component ids.
    ///
    /// # Errors
    /// Returns an error if the backing source fails.
    async fn component_ids(&self, count: usize) -> Result<Vec<ComponentId>>;
}

/// A [`ReusableIdAllocator`] behind an async mutex, shareable between sets.
#[derive(Debug, Clone, Default)]
pub struct SharedIdAllocator {
    inner: Arc<Mutex<ReusableIdAllocator>>,
}

impl SharedIdAllocator {
    /// Wraps an allocator.
    #[must_use]
    pub fn new(allocator: ReusableIdAllocator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(allocator)),
        }
    }
}

#[async_trait]
impl AsyncIdAllocator for SharedIdAllocator {
    async fn entity_ids(&self, count: usize) -> Result<Vec<u32>> {
        self.inner.lock().await.entity_ids(count)
    }

    async fn component_ids(&self, count: usize) -> Result<Vec<ComponentId>> {
        self.inner.lock().await.component_ids(count)
    }
}
