//! Integration tests for entity set listeners

use std::sync::Arc;

use cairn_foundation::{BitField, hash};
use cairn_query::Query;
use cairn_storage::{ChangeEvent, CommandOptions, EntityFilter, EntitySetConfig};
use cairn_view::{EntitySetListener, ListenerConfig};

use crate::{COMPLETED, completed, title, todo_set};

#[test]
fn mirror_holds_filtered_members() {
    let mut origin = todo_set(1);
    origin.add_component(title("no status"), CommandOptions::default()).unwrap();
    let mask: Arc<dyn EntityFilter> = Arc::new(BitField::create([COMPLETED]).unwrap());
    let mut listener = EntitySetListener::new(&mut origin, Some(mask), ListenerConfig::default()).unwrap();
    assert!(listener.mirror().is_empty());

    let added = origin
        .add_components([title("a"), completed(false)], CommandOptions::default())
        .unwrap();
    let id = added[0].entity_id();
    listener.apply_events(&origin).unwrap();
    assert_eq!(listener.mirror().entity_ids(), vec![id]);

    // the mirror keeps the origin's ids and component ids
    let mirrored = listener.mirror().component_by_entity(id, COMPLETED).unwrap();
    assert_eq!(mirrored.id(), added[1].id());
}

#[test]
fn query_filtered_mirror() {
    let mut origin = todo_set(1);
    let done: Arc<dyn EntityFilter> =
        Arc::new(Query::parse("/component/completed#/isComplete !ca true ==").unwrap());
    let mut listener = EntitySetListener::new(&mut origin, Some(done), ListenerConfig::default()).unwrap();

    let added = origin
        .add_components([title("a"), completed(false)], CommandOptions::default())
        .unwrap();
    let id = added[0].entity_id();
    listener.apply_events(&origin).unwrap();
    assert!(listener.mirror().is_empty());

    origin
        .add_component(completed(true).with_entity_id(id), CommandOptions::default())
        .unwrap();
    let changes = listener.apply_events(&origin).unwrap();
    assert_eq!(changes.entities_added.len(), 1);
    assert_eq!(listener.mirror().size(), 1);

    origin
        .add_component(completed(false).with_entity_id(id), CommandOptions::default())
        .unwrap();
    let changes = listener.apply_events(&origin).unwrap();
    assert_eq!(changes.entities_removed.len(), 1);
    assert!(listener.mirror().is_empty());
}

#[test]
fn mirror_publishes_membership_only() {
    let mut origin = todo_set(1);
    let mut listener = EntitySetListener::new(&mut origin, None, ListenerConfig::default()).unwrap();
    let events = listener.subscribe();

    let added = origin.add_component(title("a"), CommandOptions::default()).unwrap();
    listener.apply_events(&origin).unwrap();
    origin
        .add_component(title("b").with_entity_id(added[0].entity_id()), CommandOptions::default())
        .unwrap();
    listener.apply_events(&origin).unwrap();

    let names: Vec<_> = events.try_iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["entity:add"]);
}

#[test]
fn silent_listener_publishes_nothing() {
    let mut origin = todo_set(1);
    let config = ListenerConfig::new()
        .with_emit_events(false)
        .with_mirror(EntitySetConfig::new().with_esid(9));
    let mut listener = EntitySetListener::new(&mut origin, None, config).unwrap();
    let events = listener.subscribe();
    origin.add_component(title("a"), CommandOptions::default()).unwrap();
    listener.apply_events(&origin).unwrap();
    assert_eq!(listener.mirror().size(), 1);
    assert!(events.try_recv().is_err());
}

#[test]
fn mirror_announces_new_entities_once() {
    let mut origin = todo_set(1);
    let mut listener = EntitySetListener::new(&mut origin, None, ListenerConfig::default()).unwrap();
    let mirror_events = listener.subscribe();

    origin
        .add_components([title("a"), completed(true)], CommandOptions::default())
        .unwrap();
    listener.apply_events(&origin).unwrap();

    let adds: usize = mirror_events
        .try_iter()
        .filter_map(|e| match e {
            ChangeEvent::EntityAdd(entities) => Some(entities.len()),
            _ => None,
        })
        .sum();
    assert_eq!(adds, 1);
}

#[test]
fn hash_combines_origin_and_filter() {
    let mut origin = todo_set(1);
    let mask = BitField::create([COMPLETED]).unwrap();
    let filter_hash = EntityFilter::hash(&mask);
    let listener = EntitySetListener::new(&mut origin, Some(Arc::new(mask)), ListenerConfig::default()).unwrap();
    assert_eq!(listener.hash(&origin), hash::combine(origin.hash(), filter_hash));
}
