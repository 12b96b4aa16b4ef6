//! Integration tests for sinks

use cairn_storage::{AsyncEntitySet, CommandOptions, EntitySet, EntitySetConfig, RegisterOptions};
use cairn_view::{Envelope, Sink, SinkItem};

use crate::{TITLE, completed, title, todo_set};

fn envelopes(origin: &EntitySet, events: &flume::Receiver<cairn_storage::ChangeEvent>) -> Vec<Envelope> {
    events
        .try_iter()
        .flat_map(|event| Envelope::from_event(origin.uuid(), &event))
        .collect()
}

#[test]
fn replica_follows_origin() {
    let mut origin = todo_set(1);
    let events = origin.subscribe();
    let mut replica = todo_set(1);
    let sink = Sink::new();

    let added = origin
        .add_components([title("a"), completed(false)], CommandOptions::default())
        .unwrap();
    let id = added[0].entity_id();
    let report = sink.consume(&mut replica, envelopes(&origin, &events));
    assert_eq!(report.failed, 0);
    assert_eq!(replica.size(), 1);

    origin
        .add_component(title("renamed").with_entity_id(id), CommandOptions::default())
        .unwrap();
    sink.consume(&mut replica, envelopes(&origin, &events));
    let text = replica.component_by_entity(id, TITLE).and_then(|c| c.get("text")).cloned();
    assert_eq!(text, Some("renamed".into()));

    origin.remove_entity(id, CommandOptions::default()).unwrap();
    sink.consume(&mut replica, envelopes(&origin, &events));
    assert!(replica.is_empty());
}

#[test]
fn sets_do_not_echo_their_own_changes() {
    let mut origin = todo_set(1);
    let events = origin.subscribe();
    origin.add_component(title("a"), CommandOptions::default()).unwrap();
    let own = envelopes(&origin, &events);
    assert!(!own.is_empty());

    let report = Sink::new().consume(&mut origin, own);
    assert_eq!(report.applied, 0);
    assert_eq!(report.skipped, report.total());
    assert_eq!(origin.size(), 1);
}

#[test]
fn clones_accept_changes_from_their_source() {
    let mut origin = todo_set(1);
    let events = origin.subscribe();
    let mut copy = origin.clone();
    origin.add_component(title("a"), CommandOptions::default()).unwrap();

    let report = Sink::new().consume(&mut copy, envelopes(&origin, &events));
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(copy.size(), 1);
}

#[test]
fn deferred_sink_applies_on_flush() {
    let mut target = todo_set(1);
    let sink = Sink::new().with_options(CommandOptions::deferred());
    let items = [SinkItem::Component(title("a")), SinkItem::Component(completed(true))];
    let report = sink.consume(&mut target, items.into_iter().map(Envelope::from));
    assert_eq!(report.applied, 2);
    assert!(target.is_empty());

    // loose components queued together share one new entity
    let changes = target.flush(CommandOptions::default()).unwrap();
    assert_eq!(changes.entities_added.len(), 1);
    assert_eq!(changes.components_added.len(), 2);
}

#[tokio::test]
async fn entity_snapshots_stream_into_async_sets() {
    let mut origin = todo_set(1);
    let events = origin.subscribe();
    origin
        .add_components([title("a"), completed(true)], CommandOptions::default())
        .unwrap();
    origin.add_component(title("b"), CommandOptions::default()).unwrap();

    let mut target = AsyncEntitySet::new(EntitySetConfig::new().with_esid(2));
    for def in origin.registry().component_defs() {
        target
            .inner_mut()
            .register_def(def.clone(), RegisterOptions::default())
            .unwrap();
    }

    let snapshots: Vec<Envelope> = envelopes(&origin, &events)
        .into_iter()
        .filter(|e| matches!(e.item, SinkItem::Entity(_)))
        .collect();
    assert_eq!(snapshots.len(), 2);
    let stream = futures::stream::iter(snapshots);
    let report = Sink::new().consume_stream(&mut target, stream).await;
    assert_eq!(report.failed, 0);
    assert_eq!(target.size(), 2);
    assert!(target.inner().entities().all(|e| e.id().entity_set_id() == 2));
}
