//! End-to-end query scenarios

use cairn_foundation::{EntityId, Value};
use cairn_query::{Query, StackValue};

use crate::{add_todo, single_list, texts, todo_set};

#[test]
fn completed_todos_and_their_titles() {
    let mut es = todo_set();
    let e1 = add_todo(&mut es, "a", None, None);
    let e2 = add_todo(&mut es, "b", Some(true), None);

    let done = Query::parse("/component/completed#/isComplete !ca true ==").unwrap();
    assert_eq!(done.entity_ids(&es).unwrap(), vec![e2]);

    let titles = Query::parse("/component/title !bf @c").unwrap();
    let items = single_list(titles.execute(&es).unwrap());
    assert_eq!(texts(&items), vec!["a", "b"]);
    let owners: Vec<EntityId> = items.iter().filter_map(StackValue::entity_id).collect();
    assert_eq!(owners, vec![e1, e2]);
}

#[test]
fn filtered_entities_feed_fetches() {
    let mut es = todo_set();
    add_todo(&mut es, "get out of bed", Some(true), Some(10));
    add_todo(&mut es, "phone up friend", Some(false), Some(-5));
    add_todo(&mut es, "turn on the news", Some(true), Some(0));

    let q = Query::parse("/component/completed#/isComplete !ca true == /component/title !bf @c").unwrap();
    let items = single_list(q.execute(&es).unwrap());
    assert_eq!(texts(&items), vec!["get out of bed", "turn on the news"]);
}

#[test]
fn entities_as_maps() {
    let mut es = todo_set();
    let id = add_todo(&mut es, "water plants", Some(false), None);

    // entity maps are keyed by def uri, so the pointer escapes its slashes
    let q = Query::parse("/component/title !bf @e '/~1component~1title/text' pluck").unwrap();
    let out = q.execute(&es).unwrap();
    assert_eq!(out, vec![StackValue::Value(Value::from("water plants"))]);

    let q = Query::parse("/component/title !bf @e '@e' pluck").unwrap();
    let out = q.execute(&es).unwrap();
    assert_eq!(out, vec![StackValue::Value(Value::from(id.raw()))]);
}

#[test]
fn queries_accept_entities_individually() {
    let mut es = todo_set();
    add_todo(&mut es, "a", Some(true), None);
    add_todo(&mut es, "b", Some(false), None);
    add_todo(&mut es, "c", None, None);

    let q = Query::parse("/component/completed#/isComplete !ca false ==").unwrap();
    let accepted = es
        .entities()
        .filter(|e| cairn_storage::EntityFilter::accepts(&q, es.registry(), e).unwrap())
        .count();
    assert_eq!(accepted, 1);
}

#[test]
fn query_hash_is_text_hash() {
    let a = Query::parse("/component/title !bf @e").unwrap();
    let b = Query::parse("/component/title !bf @e").unwrap();
    assert_eq!(a.hash(), b.hash());
    assert_eq!(a.hash(), cairn_foundation::hash::hash_str(a.text()));
    assert_eq!(a.to_string(), "/component/title !bf @e");
    assert_ne!(a.hash(), Query::parse("/component/title !bf @eid").unwrap().hash());
}
