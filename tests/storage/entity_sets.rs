//! Integration tests for entity sets and the synchronous command buffer

use std::sync::Arc;

use cairn_foundation::{BitField, EntityId, MatchMode, Value};
use cairn_storage::{
    ChangeEvent, CommandBuffer, CommandOptions, Entity, EntitySet, EntitySetConfig, MemoryAdapter,
};

use crate::{DEAD, HEALTH, POSITION, com, world};

fn populated(count: usize) -> (EntitySet, Vec<EntityId>) {
    let mut es = EntitySet::default();
    world(&mut es);
    let mut ids = Vec::new();
    for i in 0..count {
        let added = es
            .add_components(
                [com(POSITION, "x", i as u64), com(HEALTH, "hp", 10)],
                CommandOptions::default(),
            )
            .unwrap();
        ids.push(added[0].entity_id());
    }
    (es, ids)
}

// =============================================================================
// Convergence
// =============================================================================

#[test]
fn add_then_remove_converges_to_empty() {
    let mut es = EntitySet::default();
    world(&mut es);
    let added = es.add_component(com(POSITION, "x", 1), CommandOptions::default()).unwrap();
    assert_eq!(es.size(), 1);

    es.remove_component(&added[0], CommandOptions::default()).unwrap();
    assert_eq!(es.size(), 0);
    assert_eq!(es.components().count(), 0);
}

#[test]
fn removing_twice_is_tolerated() {
    let mut es = EntitySet::default();
    world(&mut es);
    let added = es.add_component(com(POSITION, "x", 1), CommandOptions::default()).unwrap();
    es.remove_component(&added[0], CommandOptions::default()).unwrap();
    let again = es.remove_component(&added[0], CommandOptions::default()).unwrap();
    assert!(again.is_empty());
    assert!(es.remove_entity(added[0].entity_id(), CommandOptions::default()).unwrap().is_empty());
}

/// Dead entities lose all their components, which removes them.
fn reap(es: &mut EntitySet) -> usize {
    let mask = BitField::create([DEAD]).unwrap();
    let doomed: Vec<_> = es
        .entities()
        .filter(|e| mask.matches(e.bit_field()))
        .flat_map(|e| e.components().cloned().collect::<Vec<_>>())
        .collect();
    es.remove_components(doomed.into_iter().map(Into::into), CommandOptions::default())
        .unwrap();
    es.last_changes().entities_removed.len()
}

#[test]
fn reaper_removes_dead_entities() {
    let (mut es, ids) = populated(4);
    assert_eq!(es.size(), 4);

    es.add_component(com(DEAD, "at", 1).with_entity_id(ids[1]), CommandOptions::default())
        .unwrap();
    assert_eq!(reap(&mut es), 1);
    assert_eq!(es.size(), 3);
    assert!(es.entity(ids[1]).is_none());

    es.add_component(com(DEAD, "at", 2).with_entity_id(ids[3]), CommandOptions::default())
        .unwrap();
    assert_eq!(reap(&mut es), 1);
    assert_eq!(es.size(), 2);
    assert_eq!(es.entity_ids(), vec![ids[0], ids[2]]);
}

// =============================================================================
// Classification
// =============================================================================

#[test]
fn add_entity_diffs_against_existing() {
    let mut es = EntitySet::default();
    world(&mut es);
    let added = es
        .add_components(
            [com(POSITION, "x", 1), com(HEALTH, "hp", 5), com(DEAD, "at", 0)],
            CommandOptions::default(),
        )
        .unwrap();
    let id = added[0].entity_id();
    let rx = es.subscribe();

    let existing = es.entity(id).unwrap().clone();
    let mut next = Entity::new(id);
    next.add_component(existing.component(POSITION).unwrap().clone());
    next.add_component(existing.component(HEALTH).unwrap().clone().with("hp", 4));
    es.add_entity(next, CommandOptions::default()).unwrap();

    let changes = es.last_changes();
    assert_eq!(changes.components_removed.len(), 1);
    assert_eq!(changes.components_removed[0].def_id(), DEAD);
    assert_eq!(changes.entities_updated.len(), 1);
    assert!(changes.entities_added.is_empty());

    let stored = es.entity(id).unwrap();
    assert_eq!(stored.bit_field().to_values(), vec![POSITION, HEALTH]);
    assert_eq!(stored.component(HEALTH).unwrap().get("hp"), Some(&Value::Int(4)));
    assert_eq!(
        stored.component(POSITION).unwrap().id(),
        existing.component(POSITION).unwrap().id()
    );

    let removed: Vec<_> = rx
        .try_iter()
        .filter_map(|e| match e {
            ChangeEvent::ComponentRemove(cs) => Some(cs),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(removed.len(), 1);
}

#[test]
fn one_batch_many_entities() {
    let (mut es, ids) = populated(2);
    let mut buffer = CommandBuffer::new();
    buffer
        .add_component(&mut es, com(HEALTH, "hp", 1).with_entity_id(ids[0]), CommandOptions::deferred())
        .unwrap();
    buffer
        .add_component(&mut es, com(POSITION, "x", 9), CommandOptions::deferred())
        .unwrap();
    buffer.remove_entity(&mut es, ids[1], CommandOptions::deferred()).unwrap();
    assert_eq!(buffer.pending(), 6);
    assert_eq!(es.size(), 2);

    let changes = buffer.execute(&mut es, CommandOptions::default()).unwrap();
    assert_eq!(changes.counts(), (1, 1, 1, 1, 1, 2));
    assert_eq!(buffer.pending(), 0);
    assert_eq!(es.size(), 2);
}

#[test]
fn events_are_ordered_removals_first() {
    let (mut es, ids) = populated(1);
    let rx = es.subscribe();
    es.remove_entity(ids[0], CommandOptions::deferred()).unwrap();
    es.add_component(com(POSITION, "x", 3), CommandOptions::deferred()).unwrap();
    es.flush(CommandOptions::default()).unwrap();

    let names: Vec<_> = rx.try_iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        vec!["component:remove", "entity:remove", "component:add", "entity:add"]
    );
}

// =============================================================================
// Filters
// =============================================================================

#[test]
fn and_filter_limits_membership() {
    let mut es = EntitySet::default();
    world(&mut es);
    es.set_filter(Some(Arc::new(BitField::create([POSITION, HEALTH]).unwrap())))
        .unwrap();

    es.add_component(com(POSITION, "x", 1), CommandOptions::default()).unwrap();
    assert!(es.is_empty());
    let added = es
        .add_components([com(POSITION, "x", 1), com(HEALTH, "hp", 1)], CommandOptions::default())
        .unwrap();
    assert_eq!(es.size(), 1);

    // dropping below the filter removes the entity
    es.remove_component(&added[1], CommandOptions::default()).unwrap();
    assert!(es.is_empty());
}

#[test]
fn or_filter_accepts_either() {
    let mut es = EntitySet::default();
    world(&mut es);
    let mask = BitField::create([HEALTH, DEAD]).unwrap().with_mode(MatchMode::Or);
    es.set_filter(Some(Arc::new(mask))).unwrap();

    es.add_component(com(POSITION, "x", 1), CommandOptions::default()).unwrap();
    es.add_component(com(HEALTH, "hp", 1), CommandOptions::default()).unwrap();
    es.add_component(com(DEAD, "at", 1), CommandOptions::default()).unwrap();
    assert_eq!(es.size(), 2);
}

#[test]
fn evaluate_entities_drops_non_members() {
    let (mut es, ids) = populated(3);
    es.add_component(com(DEAD, "at", 1).with_entity_id(ids[2]), CommandOptions::default())
        .unwrap();
    let not_dead = BitField::create([DEAD]).unwrap().with_mode(MatchMode::Not);
    let removed = es.set_filter(Some(Arc::new(not_dead))).unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id(), ids[2]);
    assert!(es.evaluate_entities(None).unwrap().is_empty());
}

// =============================================================================
// Identity, Hashing and Persistence
// =============================================================================

#[test]
fn ids_carry_the_set_id() {
    let mut es = EntitySet::new(EntitySetConfig::new().with_esid(12).with_entity_id_start(100));
    world(&mut es);
    let added = es.add_component(com(POSITION, "x", 0), CommandOptions::default()).unwrap();
    let id = added[0].entity_id();
    assert_eq!(id.entity_set_id(), 12);
    assert_eq!(id.local_id(), 100);
}

#[test]
fn highest_set_id_keeps_chosen_ids() {
    let esid = EntityId::MAX_ENTITY_SET_ID;
    let mut es = EntitySet::new(EntitySetConfig::new().with_esid(esid));
    world(&mut es);
    let chosen = EntityId::compose(5, esid);
    es.add_entity(
        Entity::from_components(chosen, [com(POSITION, "x", 1)]),
        CommandOptions::default(),
    )
    .unwrap();
    assert!(es.entity(chosen).is_some());

    let loose = es.add_component(com(HEALTH, "hp", 4), CommandOptions::default()).unwrap();
    let fresh = loose[0].entity_id();
    assert_ne!(fresh, chosen);
    assert_eq!(fresh.entity_set_id(), esid);
    assert_eq!(es.size(), 2);
    assert!(!es.entity(chosen).unwrap().has(HEALTH));
}

#[test]
fn exhausted_local_ids_are_an_error() {
    let mut es = EntitySet::default();
    world(&mut es);
    let last = EntityId::compose(u32::MAX, 1);
    es.add_entity(
        Entity::from_components(last, [com(POSITION, "x", 1)]),
        CommandOptions::default(),
    )
    .unwrap();
    assert!(es.entity(last).is_some());

    let err = es.add_component(com(HEALTH, "hp", 1), CommandOptions::default());
    assert!(err.is_err());
    assert_eq!(es.size(), 1);
    assert!(es.create_entity_id().is_err());
}

#[test]
fn hash_follows_content() {
    let (mut es, ids) = populated(2);
    let before = es.hash();
    assert_eq!(before, es.hash());

    es.add_component(com(HEALTH, "hp", 3).with_entity_id(ids[0]), CommandOptions::default())
        .unwrap();
    let changed = es.hash();
    assert_ne!(before, changed);

    es.set_filter(Some(Arc::new(BitField::create([HEALTH]).unwrap()))).unwrap();
    assert_ne!(changed, es.hash());
}

#[test]
fn json_export_names_defs() {
    let (es, _) = populated(1);
    let json = es.to_json();
    let text = json.to_string();
    assert!(text.contains("/component/position"));
    assert!(text.contains("/component/health"));
}

#[test]
fn adapter_mirrors_contents() {
    let (mut es, ids) = populated(2);
    es.attach_adapter(Box::new(MemoryAdapter::new())).unwrap();
    assert_eq!(es.stored_components(ids[0]).unwrap().len(), 2);

    es.add_component(com(DEAD, "at", 1).with_entity_id(ids[0]), CommandOptions::default())
        .unwrap();
    assert_eq!(es.stored_components(ids[0]).unwrap().len(), 3);

    es.remove_entity(ids[1], CommandOptions::default()).unwrap();
    assert!(es.stored_components(ids[1]).unwrap().is_empty());
}

#[test]
fn stored_components_need_an_adapter() {
    let (es, ids) = populated(1);
    assert!(es.stored_components(ids[0]).is_err());
}
