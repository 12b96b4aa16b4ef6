//! Integration tests for the asynchronous command buffer

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use cairn_foundation::{ComponentId, EntityId, Result};
use cairn_storage::{AsyncEntitySet, AsyncIdAllocator, CommandOptions, Entity, EntitySet, EntitySetConfig};

use crate::{DEAD, HEALTH, POSITION, com, world};

fn set() -> AsyncEntitySet {
    let mut es = AsyncEntitySet::new(EntitySetConfig::new().with_esid(1));
    world(es.inner_mut());
    es
}

// =============================================================================
// Classification
// =============================================================================

#[tokio::test]
async fn classification_table() {
    let mut es = set();
    let opts = CommandOptions::default();

    // new component, no entity
    let added = es.add_component(com(POSITION, "x", 1), opts).await.unwrap();
    assert_eq!(es.last_changes().counts(), (1, 0, 0, 1, 0, 0));
    let eid = added[0].entity_id();

    // new def on an existing entity
    let health = es
        .add_component(com(HEALTH, "hp", 3).with_entity_id(eid), opts)
        .await
        .unwrap();
    assert_eq!(es.last_changes().counts(), (0, 1, 0, 1, 0, 0));

    // same def again
    es.add_component(com(HEALTH, "hp", 2).with_entity_id(eid), opts)
        .await
        .unwrap();
    assert_eq!(es.last_changes().counts(), (0, 1, 0, 0, 1, 0));
    assert_eq!(es.inner().component_by_entity(eid, HEALTH).unwrap().id(), health[0].id());

    // remove a component that is not the last
    es.remove_component(health[0].id(), opts).await.unwrap();
    assert_eq!(es.last_changes().counts(), (0, 1, 0, 0, 0, 1));

    // remove the last component
    es.remove_component(added[0].id(), opts).await.unwrap();
    assert_eq!(es.last_changes().counts(), (0, 0, 1, 0, 0, 1));
    assert_eq!(es.size(), 0);

    // remove an entity that is not there
    es.remove_entity(eid, opts).await.unwrap();
    assert_eq!(es.last_changes().counts(), (0, 0, 0, 0, 0, 0));
}

#[tokio::test]
async fn own_esid_ids_are_kept() {
    let mut es = set();
    let wanted = EntityId::compose(500, 1);
    let added = es
        .add_component(com(POSITION, "x", 1).with_entity_id(wanted), CommandOptions::default())
        .await
        .unwrap();
    assert_eq!(added[0].entity_id(), wanted);
    assert_eq!(es.last_changes().counts(), (1, 0, 0, 1, 0, 0));
}

#[tokio::test]
async fn foreign_entities_become_new() {
    let mut es = set();
    let foreign = Entity::from_components(
        EntityId::compose(7, 42),
        [com(POSITION, "x", 1), com(DEAD, "at", 1)],
    );
    let added = es.add_entity(foreign, CommandOptions::default()).await.unwrap();
    assert_eq!(added[0].id().entity_set_id(), 1);
    assert_eq!(es.last_changes().counts(), (1, 0, 0, 2, 0, 0));
    assert!(es.get_entity(added[0].id(), true).unwrap().is_some());
}

#[tokio::test]
async fn deferred_until_flush() {
    let mut es = set();
    let deferred = CommandOptions::deferred();
    es.add_component(com(POSITION, "x", 1), deferred).await.unwrap();
    es.add_component(com(HEALTH, "hp", 1), deferred).await.unwrap();
    assert_eq!(es.size(), 0);
    let changes = es.flush(CommandOptions::default()).await.unwrap();
    assert_eq!(changes.counts(), (1, 0, 0, 2, 0, 0));
    assert_eq!(es.size(), 1);
}

#[tokio::test]
async fn add_then_remove_converges() {
    let mut es = set();
    let added = es
        .add_component(com(POSITION, "x", 1), CommandOptions::default())
        .await
        .unwrap();
    es.remove_component(&added[0], CommandOptions::default()).await.unwrap();
    assert_eq!(es.size(), 0);
    assert_eq!(es.inner().components().count(), 0);
}

// =============================================================================
// Allocators
// =============================================================================

#[derive(Default)]
struct Sequence {
    entities: AtomicU32,
    components: AtomicU64,
    calls: AtomicU32,
}

#[async_trait]
impl AsyncIdAllocator for Sequence {
    async fn entity_ids(&self, count: usize) -> Result<Vec<u32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        let start = self.entities.fetch_add(count, Ordering::SeqCst) + 1000;
        Ok((start..start + count).collect())
    }

    async fn component_ids(&self, count: usize) -> Result<Vec<ComponentId>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let count = count as u64;
        let start = self.components.fetch_add(count, Ordering::SeqCst) + 5000;
        Ok((start..start + count).collect())
    }
}

#[tokio::test]
async fn ids_come_from_the_allocator() {
    let allocator = std::sync::Arc::new(Sequence::default());
    let mut inner = EntitySet::new(EntitySetConfig::new().with_esid(2));
    world(&mut inner);
    let mut es = AsyncEntitySet::with_allocator(inner, allocator.clone());

    let added = es
        .add_components([com(POSITION, "x", 1), com(HEALTH, "hp", 1)], CommandOptions::default())
        .await
        .unwrap();
    assert_eq!(added[0].entity_id(), EntityId::compose(1000, 2));
    let mut ids: Vec<_> = added.iter().map(|c| c.id()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![5000, 5001]);
    assert_eq!(allocator.calls.load(Ordering::SeqCst), 2);

    // updates need no ids
    es.add_component(com(POSITION, "x", 2).with_entity_id(added[0].entity_id()), CommandOptions::default())
        .await
        .unwrap();
    assert_eq!(allocator.calls.load(Ordering::SeqCst), 2);
}
