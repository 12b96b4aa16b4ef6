//! Mirrors of an origin entity set.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};
use uuid::Uuid;

use cairn_foundation::{EntityId, Error, Result, hash};
use cairn_storage::{ChangeEvent, ChangeSet, CommandOptions, Entity, EntityFilter, EntitySet};

use crate::config::ListenerConfig;

/// Keeps a mirror entity set in step with an origin set, restricted by an
/// optional filter.
///
/// Origin events only record which entities were added, removed or changed;
/// [`EntitySetListener::apply_events`] then reads their current state from
/// the origin and applies it to the mirror silently, followed by one
/// `EntityAdd`/`EntityRemove` publication on the mirror.
pub struct EntitySetListener {
    origin_uuid: Uuid,
    config: ListenerConfig,
    receiver: flume::Receiver<ChangeEvent>,
    mirror: EntitySet,
    added: BTreeSet<EntityId>,
    removed: BTreeSet<EntityId>,
    changed: BTreeSet<EntityId>,
}

impl EntitySetListener {
    /// Subscribes to `origin` and fills the mirror with its current members
    /// that pass `filter`.
    ///
    /// # Errors
    /// Returns an error if the filter cannot be evaluated.
    pub fn new(
        origin: &mut EntitySet,
        filter: Option<Arc<dyn EntityFilter>>,
        config: ListenerConfig,
    ) -> Result<Self> {
        let receiver = origin.subscribe();
        let mut mirror = EntitySet::with_registry(config.mirror.clone(), origin.registry().clone());
        mirror.set_filter(filter)?;
        mirror.reset(origin.entities().cloned())?;
        debug!(origin = %origin.uuid(), size = mirror.size(), "listener attached");
        Ok(Self {
            origin_uuid: origin.uuid(),
            config,
            receiver,
            mirror,
            added: BTreeSet::new(),
            removed: BTreeSet::new(),
            changed: BTreeSet::new(),
        })
    }

    /// Returns the mirror.
    #[must_use]
    pub const fn mirror(&self) -> &EntitySet {
        &self.mirror
    }

    /// Subscribes to the mirror's events.
    pub fn subscribe(&mut self) -> flume::Receiver<ChangeEvent> {
        self.mirror.subscribe()
    }

    /// Returns the uuid of the origin set.
    #[must_use]
    pub const fn origin_uuid(&self) -> Uuid {
        self.origin_uuid
    }

    /// Returns the number of recorded entity ids awaiting `apply_events`.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }

    /// Hash of the origin's content combined with the mirror's filter.
    #[must_use]
    pub fn hash(&self, origin: &EntitySet) -> u32 {
        let filter = self.mirror.filter().map_or(0, |f| f.hash());
        hash::combine(origin.hash(), filter)
    }

    /// Drains origin events into the added/removed/changed records.
    pub fn record_events(&mut self) {
        for event in self.receiver.try_iter() {
            trace!(event = event.name(), items = event.len(), "listener received");
            match event {
                ChangeEvent::EntityAdd(entities) => {
                    for e in entities {
                        self.removed.remove(&e.id());
                        self.added.insert(e.id());
                    }
                }
                ChangeEvent::EntityRemove(entities) => {
                    for e in entities {
                        self.added.remove(&e.id());
                        self.changed.remove(&e.id());
                        self.removed.insert(e.id());
                    }
                }
                ChangeEvent::EntityChange(entities) => {
                    self.changed.extend(entities.iter().map(Entity::id));
                }
                ChangeEvent::ComponentAdd(components)
                | ChangeEvent::ComponentRemove(components)
                | ChangeEvent::ComponentChange(components) => {
                    self.changed.extend(components.iter().map(|c| c.entity_id()));
                }
            }
        }
    }

    /// Applies recorded changes using the origin's current state and
    /// returns the mirror's resulting change set.
    ///
    /// # Errors
    /// Returns an error if `origin` is not this listener's origin, or the
    /// mirror rejects the batch.
    pub fn apply_events(&mut self, origin: &EntitySet) -> Result<ChangeSet> {
        if origin.uuid() != self.origin_uuid {
            return Err(Error::invalid_argument(format!(
                "listener of {} applied from entity set {}",
                self.origin_uuid,
                origin.uuid()
            )));
        }
        self.record_events();

        let mut upserts = Vec::new();
        let mut removals: Vec<EntityId> = std::mem::take(&mut self.removed)
            .into_iter()
            .filter(|id| self.mirror.entity(*id).is_some())
            .collect();
        let touched: BTreeSet<EntityId> = std::mem::take(&mut self.added)
            .into_iter()
            .chain(std::mem::take(&mut self.changed))
            .collect();
        for id in touched {
            match origin.entity(id) {
                Some(entity) => upserts.push(entity.clone()),
                None if self.mirror.entity(id).is_some() => removals.push(id),
                None => {}
            }
        }

        let quiet = CommandOptions::deferred().with_silent(true);
        self.mirror.add_entities(upserts, quiet)?;
        self.mirror.remove_entities(removals, quiet)?;
        let changes = self.mirror.flush(CommandOptions::new().with_silent(true))?;

        debug!(
            added = changes.entities_added.len(),
            updated = changes.entities_updated.len(),
            removed = changes.entities_removed.len(),
            "listener applied changes"
        );
        if self.config.emit_events {
            self.mirror.publish_changes(&ChangeSet {
                entities_added: changes.entities_added.clone(),
                entities_removed: changes.entities_removed.clone(),
                ..ChangeSet::default()
            });
        }
        Ok(changes)
    }
}

impl fmt::Debug for EntitySetListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySetListener")
            .field("origin", &self.origin_uuid)
            .field("mirror", &self.mirror)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
