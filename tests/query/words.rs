//! Integration tests for fetch and utility words

use cairn_foundation::{ErrorKind, Value};
use cairn_query::{Query, StackValue};

use crate::{add_todo, single_list, texts, todo_set};

fn run(es: &cairn_storage::EntitySet, text: &str) -> Vec<StackValue> {
    Query::parse(text).unwrap().execute(es).unwrap()
}

fn values(items: &[StackValue]) -> Vec<Value> {
    items.iter().filter_map(StackValue::to_value).collect()
}

// =============================================================================
// Fetching
// =============================================================================

#[test]
fn attribute_fetch_defaults_to_holders() {
    let mut es = todo_set();
    add_todo(&mut es, "a", Some(true), Some(1));
    add_todo(&mut es, "b", None, Some(2));
    add_todo(&mut es, "c", Some(false), None);

    let items = single_list(run(&es, "'/component/priority#/priority' @ca"));
    assert_eq!(values(&items), vec![Value::Int(1), Value::Int(2)]);

    let items = single_list(run(&es, "/component/title !bf /component/completed#/isComplete !ca @ca"));
    assert_eq!(values(&items), vec![Value::Bool(true), Value::Null, Value::Bool(false)]);
}

#[test]
fn entity_fetch_by_id() {
    let mut es = todo_set();
    let id = add_todo(&mut es, "a", None, None);

    #[allow(clippy::cast_possible_wrap)]
    let raw = id.raw() as i64;
    let out = run(&es, &format!("{raw} @eid"));
    assert_eq!(out, vec![StackValue::Value(Value::from(id.raw()))]);

    let out = run(&es, "999999 @e");
    assert_eq!(out, vec![StackValue::Value(Value::Bool(false))]);
}

#[test]
fn all_selects_every_entity() {
    let mut es = todo_set();
    add_todo(&mut es, "a", None, None);
    add_todo(&mut es, "b", Some(true), None);
    assert_eq!(single_list(run(&es, "all @eid")).len(), 2);
    assert_eq!(single_list(run(&es, "@e")).len(), 2);
    assert_eq!(single_list(run(&es, "all !bf @c")).len(), 3);
}

#[test]
fn limit_slices_results() {
    let mut es = todo_set();
    for text in ["a", "b", "c", "d"] {
        add_todo(&mut es, text, None, None);
    }
    let items = single_list(run(&es, "/component/title !bf @c 1 2 limit"));
    assert_eq!(texts(&items), vec!["b", "c"]);
    let items = single_list(run(&es, "/component/title !bf @c 3 10 limit"));
    assert_eq!(texts(&items), vec!["d"]);

    let err = Query::parse("/component/title !bf @c -1 2 limit").unwrap().execute(&es).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Stack { .. }));
}

#[test]
fn pluck_with_several_keys() {
    let mut es = todo_set();
    add_todo(&mut es, "a", None, Some(4));

    let out = run(&es, "/component/priority !bf @c ['priority' '@s'] pluck");
    let items = single_list(out);
    let [StackValue::Value(Value::Map(picked))] = items.as_slice() else {
        panic!("unexpected {items:?}");
    };
    assert_eq!(picked.get("priority"), Some(&Value::Int(4)));
    assert_eq!(picked.get("@s"), Some(&Value::from(3u32)));
    assert_eq!(picked.len(), 2);
}

#[test]
fn define_names_a_value() {
    let mut es = todo_set();
    add_todo(&mut es, "a", Some(true), None);
    add_todo(&mut es, "b", Some(false), None);
    let items = single_list(run(
        &es,
        "/component/completed#/isComplete !ca done define done true == /component/title !bf @c",
    ));
    assert_eq!(texts(&items), vec!["a"]);
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn errors_name_the_operator() {
    let es = todo_set();
    let err = Query::parse("1 2 pluck").unwrap().execute(&es).unwrap_err();
    match err.kind {
        ErrorKind::Stack { op, .. } => assert_eq!(op, "pluck"),
        other => panic!("unexpected {other:?}"),
    }

    let err = Query::parse("/component/nope#/x !ca").unwrap().execute(&es).unwrap_err();
    assert!(err.to_string().contains("/component/nope"));

    let err = Query::parse("'a' 'b' and").unwrap().execute(&es).unwrap_err();
    assert!(err.to_string().contains("and"));
}

#[test]
fn parse_errors_carry_position() {
    let err = Query::parse("/component/title !bf\n  'open").unwrap_err();
    match err.kind {
        ErrorKind::ParseError { line, column, .. } => assert_eq!((line, column), (2, 3)),
        other => panic!("unexpected {other:?}"),
    }
}
