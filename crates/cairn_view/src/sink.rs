//! Consuming change streams into an entity set.
//!
//! A sink reads [`Envelope`]s, each carrying one [`SinkItem`] and the uuid
//! of the set it came from, and applies them to a target set. Items that
//! originated from the target itself are skipped, so two sets can feed
//! each other without echoing. A failing item is logged and counted; the
//! remaining items are still applied.

use futures::{Stream, StreamExt};
use tracing::{debug, error, trace};
use uuid::Uuid;

use cairn_foundation::{EntityId, Result};
use cairn_storage::{AsyncEntitySet, ChangeEvent, CommandOptions, Component, Entity, EntitySet};

/// One change to apply.
#[derive(Clone, Debug, PartialEq)]
pub enum SinkItem {
    /// Add or update a component.
    Component(Component),
    /// Add or replace an entity.
    Entity(Entity),
    /// Remove a component.
    RemoveComponent(Component),
    /// Remove an entity.
    RemoveEntity(EntityId),
}

/// A [`SinkItem`] and the uuid of the set it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    /// The change.
    pub item: SinkItem,
    /// The originating set, if known.
    pub origin: Option<Uuid>,
}

impl Envelope {
    /// Wraps an item with no origin.
    #[must_use]
    pub const fn new(item: SinkItem) -> Self {
        Self { item, origin: None }
    }

    /// Sets the originating set.
    #[must_use]
    pub fn with_origin(mut self, origin: Uuid) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Converts a change event published by `origin` into envelopes.
    ///
    /// `EntityChange` is skipped: the component events of the same batch
    /// carry its content.
    #[must_use]
    pub fn from_event(origin: Uuid, event: &ChangeEvent) -> Vec<Self> {
        let items: Vec<SinkItem> = match event {
            ChangeEvent::ComponentAdd(cs) | ChangeEvent::ComponentChange(cs) => {
                cs.iter().cloned().map(SinkItem::Component).collect()
            }
            ChangeEvent::ComponentRemove(cs) => cs.iter().cloned().map(SinkItem::RemoveComponent).collect(),
            ChangeEvent::EntityRemove(es) => es.iter().map(|e| SinkItem::RemoveEntity(e.id())).collect(),
            ChangeEvent::EntityAdd(es) => es.iter().cloned().map(SinkItem::Entity).collect(),
            ChangeEvent::EntityChange(_) => Vec::new(),
        };
        items
            .into_iter()
            .map(|item| Self::new(item).with_origin(origin))
            .collect()
    }
}

impl From<SinkItem> for Envelope {
    fn from(item: SinkItem) -> Self {
        Self::new(item)
    }
}

/// Counts of what a sink run did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SinkReport {
    /// Items applied.
    pub applied: usize,
    /// Items skipped because they came from the target.
    pub skipped: usize,
    /// Items that failed.
    pub failed: usize,
}

impl SinkReport {
    /// Returns the number of items seen.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.applied + self.skipped + self.failed
    }

    fn record(&mut self, outcome: Option<Result<()>>) {
        match outcome {
            None => self.skipped += 1,
            Some(Ok(())) => self.applied += 1,
            Some(Err(err)) => {
                error!(%err, "sink item failed");
                self.failed += 1;
            }
        }
    }
}

/// Applies envelopes to entity sets.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sink {
    options: CommandOptions,
}

impl Sink {
    /// Creates a sink applying items with default command options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the command options used for each item.
    #[must_use]
    pub const fn with_options(mut self, options: CommandOptions) -> Self {
        self.options = options;
        self
    }

    /// Applies every envelope to `target`.
    pub fn consume(
        &self,
        target: &mut EntitySet,
        envelopes: impl IntoIterator<Item = Envelope>,
    ) -> SinkReport {
        let mut report = SinkReport::default();
        for envelope in envelopes {
            let outcome = self.apply(target, envelope);
            report.record(outcome);
        }
        debug!(?report, "sink consumed");
        report
    }

    /// Applies every envelope of a stream to an asynchronous set.
    pub async fn consume_stream<S>(&self, target: &mut AsyncEntitySet, envelopes: S) -> SinkReport
    where
        S: Stream<Item = Envelope>,
    {
        let mut report = SinkReport::default();
        let mut envelopes = std::pin::pin!(envelopes);
        while let Some(envelope) = envelopes.next().await {
            let outcome = self.apply_async(target, envelope).await;
            report.record(outcome);
        }
        debug!(?report, "sink consumed stream");
        report
    }

    fn apply(&self, target: &mut EntitySet, envelope: Envelope) -> Option<Result<()>> {
        if envelope.origin == Some(target.uuid()) {
            trace!("sink skipped echo");
            return None;
        }
        let options = self.options;
        Some(match envelope.item {
            SinkItem::Component(c) => target.add_component(c, options).map(drop),
            SinkItem::Entity(e) => target.add_entity(e, options).map(drop),
            SinkItem::RemoveComponent(c) => target.remove_component(c, options).map(drop),
            SinkItem::RemoveEntity(id) => target.remove_entity(id, options).map(drop),
        })
    }

    async fn apply_async(&self, target: &mut AsyncEntitySet, envelope: Envelope) -> Option<Result<()>> {
        if envelope.origin == Some(target.inner().uuid()) {
            trace!("sink skipped echo");
            return None;
        }
        let options = self.options;
        Some(match envelope.item {
            SinkItem::Component(c) => target.add_component(c, options).await.map(drop),
            SinkItem::Entity(e) => target.add_entity(e, options).await.map(drop),
            SinkItem::RemoveComponent(c) => target.remove_component(c, options).await.map(drop),
            SinkItem::RemoveEntity(id) => target.remove_entity(id, options).await.map(drop),
        })
    }
}
