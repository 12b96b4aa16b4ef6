//! Integration tests for read-only views

use std::sync::Arc;

use cairn_foundation::BitField;
use cairn_query::Query;
use cairn_storage::{ChangeEvent, CommandOptions, EntityFilter};
use cairn_view::{ReadOnlyView, ViewConfig};

use crate::{COMPLETED, completed, title, todo_set};

fn done_query() -> Option<Arc<dyn EntityFilter>> {
    Some(Arc::new(
        Query::parse("/component/completed#/isComplete !ca true ==").unwrap(),
    ))
}

#[test]
fn query_views_follow_attribute_changes() {
    let mut es = todo_set(1);
    let mut view = ReadOnlyView::new(&mut es, done_query(), ViewConfig::default()).unwrap();
    let events = view.subscribe();

    let added = es
        .add_components([title("a"), completed(false)], CommandOptions::default())
        .unwrap();
    let id = added[0].entity_id();
    assert_eq!(view.sync(&es).unwrap(), 0);
    assert!(view.is_empty());

    es.add_component(completed(true).with_entity_id(id), CommandOptions::default())
        .unwrap();
    assert_eq!(view.sync(&es).unwrap(), 1);
    assert_eq!(view.entity_ids(), &[id]);
    assert!(matches!(events.try_recv(), Ok(ChangeEvent::EntityAdd(_))));

    es.add_component(completed(false).with_entity_id(id), CommandOptions::default())
        .unwrap();
    assert_eq!(view.sync(&es).unwrap(), 1);
    assert!(view.get_by_entity_id(id).is_none());
    assert!(matches!(events.try_recv(), Ok(ChangeEvent::EntityRemove(_))));
}

#[test]
fn view_snapshots_track_updates() {
    let mut es = todo_set(1);
    let mask: Arc<dyn EntityFilter> = Arc::new(BitField::create([COMPLETED]).unwrap());
    let added = es
        .add_components([title("a"), completed(false)], CommandOptions::default())
        .unwrap();
    let id = added[0].entity_id();
    let mut view = ReadOnlyView::new(&mut es, Some(mask), ViewConfig::default()).unwrap();

    es.add_component(title("renamed").with_entity_id(id), CommandOptions::default())
        .unwrap();
    assert_eq!(view.sync(&es).unwrap(), 0);
    let snapshot = view.get_by_entity_id(id).unwrap();
    let text = snapshot.component(crate::TITLE).and_then(|c| c.get("text")).cloned();
    assert_eq!(text, Some("renamed".into()));
}

#[test]
fn deferred_views_batch_until_applied() {
    let mut es = todo_set(1);
    let mut view = ReadOnlyView::new(&mut es, None, ViewConfig::deferred()).unwrap();

    es.add_component(title("a"), CommandOptions::default()).unwrap();
    es.add_component(title("b"), CommandOptions::default()).unwrap();
    assert_eq!(view.sync(&es).unwrap(), 0);
    assert_eq!(view.pending(), 2);
    assert!(view.is_empty());

    assert_eq!(view.apply_events(&es).unwrap(), 2);
    assert_eq!(view.size(), 2);
    assert_eq!(view.pending(), 0);
}

#[test]
fn removal_keeps_positions_consistent() {
    let mut es = todo_set(1);
    let mut view = ReadOnlyView::new(&mut es, None, ViewConfig::default()).unwrap();
    let ids: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|t| es.add_component(title(t), CommandOptions::default()).unwrap()[0].entity_id())
        .collect();
    view.sync(&es).unwrap();

    es.remove_entity(ids[0], CommandOptions::default()).unwrap();
    view.sync(&es).unwrap();
    assert_eq!(view.size(), 2);
    for (index, id) in view.entity_ids().iter().enumerate() {
        assert_eq!(view.position(*id), Some(index));
        assert_eq!(view.at(index).map(cairn_storage::Entity::id), Some(*id));
    }
    assert_eq!(view.position(ids[0]), None);
}

#[test]
fn mutations_go_through_the_source() {
    let mut es = todo_set(1);
    let mut other = todo_set(1);
    let mut view = ReadOnlyView::new(&mut es, None, ViewConfig::default()).unwrap();

    view.add_components(&mut es, [title("a")], CommandOptions::default())
        .unwrap();
    assert!(view.is_empty());
    view.sync(&es).unwrap();
    assert_eq!(view.size(), 1);

    assert!(view.add_components(&mut other, [title("x")], CommandOptions::default()).is_err());
    assert!(view.sync(&other).is_err());
    assert!(other.is_empty());
}

#[test]
fn query_id_names_the_filter() {
    let mut es = todo_set(1);
    let unfiltered = ReadOnlyView::new(&mut es, None, ViewConfig::default()).unwrap();
    assert_eq!(unfiltered.query_id(), "all");

    let filter = done_query();
    let expected = cairn_foundation::hash::hash_to_string(EntityFilter::hash(filter.as_deref().unwrap()));
    let filtered = ReadOnlyView::new(&mut es, filter, ViewConfig::default()).unwrap();
    assert_eq!(filtered.query_id(), expected);
}
