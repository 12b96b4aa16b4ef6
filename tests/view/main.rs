//! Integration tests for the view layer
//!
//! Tests for read-only views, listeners and sinks working against live
//! entity sets.

mod listeners;
mod sinks;
mod views;

use std::sync::Once;

use cairn_foundation::{Attributes, ComponentDefId, Value};
use cairn_storage::{Component, ComponentDef, EntitySet, EntitySetConfig, PropertyDef, RegisterOptions};

pub const TITLE: ComponentDefId = 1;
pub const COMPLETED: ComponentDefId = 2;

static TRACING: Once = Once::new();

/// Routes `tracing` output to the test writer, filtered by `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn todo_set(esid: u32) -> EntitySet {
    init_tracing();
    let mut es = EntitySet::new(EntitySetConfig::new().with_esid(esid));
    for def in [
        ComponentDef::new("/component/title").with_property(PropertyDef::new("text")),
        ComponentDef::new("/component/completed").with_property(PropertyDef::new("isComplete").with_default(false)),
    ] {
        es.register_def(def, RegisterOptions::default()).unwrap();
    }
    es
}

pub fn title(text: &str) -> Component {
    Component::new(TITLE, Attributes::new()).with("text", text)
}

pub fn completed(done: bool) -> Component {
    Component::new(COMPLETED, Attributes::new()).with("isComplete", Value::Bool(done))
}
