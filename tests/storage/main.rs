//! Integration tests for the storage layer
//!
//! Tests for the def registry, command buffer classification, entity sets
//! and the storage adapter.

mod async_sets;
mod entity_sets;
mod registry;

use cairn_foundation::{Attributes, ComponentDefId, Value};
use cairn_storage::{Component, ComponentDef, EntitySet, PropertyDef, RegisterOptions};

pub const POSITION: ComponentDefId = 1;
pub const HEALTH: ComponentDefId = 2;
pub const DEAD: ComponentDefId = 3;

pub fn defs() -> Vec<ComponentDef> {
    vec![
        ComponentDef::new("/component/position")
            .with_property(PropertyDef::new("x").with_default(0))
            .with_property(PropertyDef::new("y").with_default(0)),
        ComponentDef::new("/component/health").with_property(PropertyDef::new("hp")),
        ComponentDef::new("/component/dead"),
    ]
}

pub fn world(es: &mut EntitySet) {
    for def in defs() {
        es.register_def(def, RegisterOptions::default()).unwrap();
    }
}

pub fn com(def_id: ComponentDefId, key: &str, value: impl Into<Value>) -> Component {
    Component::new(def_id, Attributes::new()).with(key, value)
}
