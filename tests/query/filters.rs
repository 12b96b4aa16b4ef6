//! Integration tests for filter evaluation

use cairn_foundation::EntityId;
use cairn_query::{Query, StackValue};
use cairn_storage::EntitySet;

use crate::{add_todo, single_list, todo_set};

fn ids(es: &EntitySet, text: &str) -> Vec<EntityId> {
    Query::parse(text).unwrap().entity_ids(es).unwrap()
}

fn fixture() -> (EntitySet, Vec<EntityId>) {
    let mut es = todo_set();
    let ids = vec![
        add_todo(&mut es, "walk dog", Some(true), Some(3)),
        add_todo(&mut es, "wash car", Some(false), Some(8)),
        add_todo(&mut es, "feed cat", None, Some(-2)),
        add_todo(&mut es, "Water plants", Some(true), None),
    ];
    (es, ids)
}

// =============================================================================
// Logical Operators
// =============================================================================

#[test]
fn and_requires_both_sides() {
    let (es, e) = fixture();
    let found = ids(
        &es,
        "/component/completed#/isComplete !ca true == /component/priority !bf and",
    );
    assert_eq!(found, vec![e[0]]);
}

#[test]
fn or_is_a_sorted_union() {
    let (es, e) = fixture();
    let found = ids(
        &es,
        "/component/priority#/priority !ca 5 > /component/priority#/priority !ca 0 < or",
    );
    assert_eq!(found, vec![e[1], e[2]]);

    let overlapping = ids(
        &es,
        "/component/priority#/priority !ca 0 > /component/priority#/priority !ca 5 < or",
    );
    assert_eq!(overlapping, vec![e[0], e[1], e[2]]);
}

#[test]
fn not_subtracts_the_right_side() {
    let (es, e) = fixture();
    let found = ids(
        &es,
        "/component/title !bf /component/completed !bf not",
    );
    assert_eq!(found, vec![e[2]]);
}

#[test]
fn mask_beneath_a_filter_limits_the_universe() {
    let (es, e) = fixture();
    let found = ids(
        &es,
        "/component/priority !bf /component/title#/text !ca ~r/^w/i ==",
    );
    assert_eq!(found, vec![e[0], e[1]]);
}

#[test]
fn fetched_entities_beneath_a_filter_limit_the_universe() {
    let (es, e) = fixture();
    let query = Query::parse(
        "/component/priority !bf @e /component/completed#/isComplete !ca true ==",
    )
    .unwrap();
    let items = single_list(query.execute(&es).unwrap());
    let found: Vec<EntityId> = items.iter().filter_map(StackValue::entity_id).collect();
    assert_eq!(found, vec![e[0]]);

    let by_id = Query::parse("/component/priority !bf @eid /component/priority#/priority !ca 0 <")
        .unwrap();
    assert_eq!(by_id.entity_ids(&es).unwrap(), vec![e[2]]);
}

// =============================================================================
// Literals
// =============================================================================

#[test]
fn ordering_skips_missing_attributes() {
    let (es, e) = fixture();
    assert_eq!(ids(&es, "/component/priority#/priority !ca 3 >="), vec![e[0], e[1]]);
    assert_eq!(ids(&es, "3 /component/priority#/priority !ca >"), vec![e[2]]);
}

#[test]
fn list_literals_test_membership() {
    let (es, e) = fixture();
    assert_eq!(ids(&es, "/component/priority#/priority !ca [3 -2] =="), vec![e[0], e[2]]);
    assert_eq!(ids(&es, "/component/priority#/priority !ca [3 -2] !="), vec![e[1]]);
}

#[test]
fn patterns_match_text() {
    let (es, e) = fixture();
    assert_eq!(ids(&es, "/component/title#/text !ca ~r/^wa/ =="), vec![e[0], e[1]]);
    assert_eq!(ids(&es, "/component/title#/text !ca ~r/^wa/i =="), vec![e[0], e[1], e[3]]);
    assert_eq!(ids(&es, "/component/title#/text !ca ~r/^wa/i !="), vec![e[2]]);
}

#[test]
fn no_match_is_an_empty_result() {
    let (es, _) = fixture();
    assert!(ids(&es, "/component/title#/text !ca 'nothing' ==").is_empty());
}
