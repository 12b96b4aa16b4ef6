//! Change notifications.
//!
//! Entity sets and registries publish closed event enums over unbounded
//! `flume` channels. Each subscriber gets its own receiver and drains it
//! whenever it wants to catch up.

use std::fmt;

use tracing::trace;

use crate::component::Component;
use crate::def::ComponentDef;
use crate::entity::Entity;

/// A batch of changes published by an entity set after a command buffer
/// executes.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeEvent {
    /// Components had their attributes changed.
    ComponentChange(Vec<Component>),
    /// Components were detached.
    ComponentRemove(Vec<Component>),
    /// Entities were removed.
    EntityRemove(Vec<Entity>),
    /// Components were attached.
    ComponentAdd(Vec<Component>),
    /// Existing entities gained, lost, or changed components.
    EntityChange(Vec<Entity>),
    /// Entities were added.
    EntityAdd(Vec<Entity>),
}

impl ChangeEvent {
    /// Returns the event name, e.g. `entity:add`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ComponentChange(_) => "component:change",
            Self::ComponentRemove(_) => "component:remove",
            Self::EntityRemove(_) => "entity:remove",
            Self::ComponentAdd(_) => "component:add",
            Self::EntityChange(_) => "entity:change",
            Self::EntityAdd(_) => "entity:add",
        }
    }

    /// Returns the number of items carried.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::ComponentChange(c) | Self::ComponentRemove(c) | Self::ComponentAdd(c) => c.len(),
            Self::EntityRemove(e) | Self::EntityChange(e) | Self::EntityAdd(e) => e.len(),
        }
    }

    /// Returns true if no items are carried.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registry notifications.
#[derive(Clone, Debug, PartialEq)]
pub enum DefEvent {
    /// A def was registered.
    Added(ComponentDef),
    /// A def was unregistered.
    Removed(ComponentDef),
}

/// Fan-out publisher over unbounded channels.
///
/// Cloning a bus yields one with no subscribers, so a cloned registry or
/// entity set never delivers to the original's listeners.
pub struct EventBus<T> {
    senders: Vec<flume::Sender<T>>,
}

impl<T: Clone> EventBus<T> {
    /// Creates a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            senders: Vec::new(),
        }
    }

    /// Returns a receiver that sees every event published from now on.
    pub fn subscribe(&mut self) -> flume::Receiver<T> {
        let (sender, receiver) = flume::unbounded();
        self.senders.push(sender);
        receiver
    }

    /// Publishes to every live subscriber, dropping those whose receiver is
    /// gone.
    pub fn publish(&mut self, event: &T) {
        self.senders.retain(|s| s.send(event.clone()).is_ok());
        trace!(subscribers = self.senders.len(), "published event");
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.senders.len()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            senders: Vec::new(),
        }
    }
}

impl<T> fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventBus({} subscribers)", self.senders.len())
    }
}
