//! Integration tests for the query layer
//!
//! Tests for parsing and evaluating queries against an entity set.

mod filters;
mod scenarios;
mod words;

use cairn_foundation::{Attributes, EntityId, Value};
use cairn_query::StackValue;
use cairn_storage::{CommandOptions, Component, ComponentDef, Entity, EntitySet, PropertyDef, RegisterOptions};

pub const TITLE: u32 = 1;
pub const COMPLETED: u32 = 2;
pub const PRIORITY: u32 = 3;

/// Registers the todo defs and returns the set.
pub fn todo_set() -> EntitySet {
    let mut es = EntitySet::default();
    for def in [
        ComponentDef::new("/component/title").with_property(PropertyDef::new("text")),
        ComponentDef::new("/component/completed")
            .with_property(PropertyDef::new("isComplete").with_type("boolean").with_default(false)),
        ComponentDef::new("/component/priority").with_property(PropertyDef::new("priority").with_default(0)),
    ] {
        es.register_def(def, RegisterOptions::default()).unwrap();
    }
    es
}

/// Adds one todo; `completed` and `priority` are attached only when given.
pub fn add_todo(es: &mut EntitySet, text: &str, completed: Option<bool>, priority: Option<i64>) -> EntityId {
    let mut entity = Entity::new(EntityId::NONE);
    entity.add_component(Component::new(TITLE, Attributes::new()).with("text", text));
    if let Some(done) = completed {
        entity.add_component(Component::new(COMPLETED, Attributes::new()).with("isComplete", done));
    }
    if let Some(p) = priority {
        entity.add_component(Component::new(PRIORITY, Attributes::new()).with("priority", p));
    }
    let added = es.add_entity(entity, CommandOptions::default()).unwrap();
    added[0].id()
}

/// Unwraps a single list result.
pub fn single_list(out: Vec<StackValue>) -> Vec<StackValue> {
    match <[StackValue; 1]>::try_from(out) {
        Ok([StackValue::List(items)]) => items,
        Ok([other]) => panic!("expected list, got {other:?}"),
        Err(out) => panic!("expected one result, got {out:?}"),
    }
}

/// Reads `text` from title components in a result list.
pub fn texts(items: &[StackValue]) -> Vec<String> {
    items
        .iter()
        .map(|item| match item {
            StackValue::Component(c) => c.get("text").map(Value::to_text).unwrap_or_default(),
            other => panic!("expected component, got {other:?}"),
        })
        .collect()
}
