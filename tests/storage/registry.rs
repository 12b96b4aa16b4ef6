//! Integration tests for the component def registry

use cairn_foundation::{Attributes, ErrorKind, Value, hash};
use cairn_storage::{ComponentDef, ComponentRegistry, ComponentType, DefEvent, DefIdent, PropertyDef, RegisterOptions};
use serde_json::json;

// =============================================================================
// Registration and Dedup
// =============================================================================

#[test]
fn identical_defs_share_an_id() {
    let mut reg = ComponentRegistry::new();
    let a = reg
        .register(ComponentDef::new("/component/title").with_property(PropertyDef::new("text")), RegisterOptions::default())
        .unwrap();
    let b = reg
        .register(
            ComponentDef::new("/component/title").with_property(PropertyDef::new("text")),
            RegisterOptions::default().with_throw_on_exists(false),
        )
        .unwrap();
    assert_eq!(a.id(), b.id());
    assert_eq!(reg.len(), 1);
}

#[test]
fn uri_is_part_of_identity() {
    let mut reg = ComponentRegistry::new();
    let a = reg.register(ComponentDef::new("/component/a"), RegisterOptions::default()).unwrap();
    let b = reg.register(ComponentDef::new("/component/b"), RegisterOptions::default()).unwrap();
    assert_ne!(a.id(), b.id());
    assert_ne!(a.hash(), b.hash());
}

#[test]
fn changed_schema_supersedes_uri() {
    let mut reg = ComponentRegistry::new();
    let v1 = reg.register(ComponentDef::new("/component/title"), RegisterOptions::default()).unwrap();
    let v2 = reg
        .register(ComponentDef::new("/component/title").with_property(PropertyDef::new("text")), RegisterOptions::default())
        .unwrap();
    assert_ne!(v1.id(), v2.id());
    assert_eq!(reg.get("/component/title").unwrap().id(), v2.id());
    assert_eq!(reg.get(v1.id()).unwrap().id(), v1.id());
}

#[test]
fn throw_on_exists() {
    let mut reg = ComponentRegistry::new();
    reg.register(ComponentDef::new("/a"), RegisterOptions::default()).unwrap();
    let err = reg
        .register(ComponentDef::new("/a"), RegisterOptions::new().with_throw_on_exists(true))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::DefExists { .. }));
}

#[test]
fn registration_is_published() {
    let mut reg = ComponentRegistry::new();
    let rx = reg.subscribe();
    let def = reg.register(ComponentDef::new("/a"), RegisterOptions::default()).unwrap();
    assert!(matches!(rx.try_recv(), Ok(DefEvent::Added(d)) if d.id() == def.id()));
    reg.unregister(def.id());
    assert!(matches!(rx.try_recv(), Ok(DefEvent::Removed(_))));
    assert!(reg.get(def.id()).is_none());
}

// =============================================================================
// Lookup
// =============================================================================

#[test]
fn lookup_by_every_identifier() {
    let mut reg = ComponentRegistry::new();
    let def = reg
        .register(ComponentDef::new("/component/channel_member"), RegisterOptions::default())
        .unwrap();
    let id = def.id();
    assert_eq!(reg.get("/component/channel_member").map(ComponentDef::id), Some(id));
    assert_eq!(reg.get("ChannelMember").map(ComponentDef::id), Some(id));
    assert_eq!(reg.get(DefIdent::Hash(def.hash())).map(ComponentDef::id), Some(id));
    assert_eq!(reg.get(hash::hash_to_string(def.hash()).as_str()).map(ComponentDef::id), Some(id));
    assert_eq!(reg.get_by_value(&Value::Int(i64::from(id))).map(ComponentDef::id), Some(id));
    assert!(reg.get("/component/missing").is_none());
}

#[test]
fn component_def_throws_on_request() {
    let reg = ComponentRegistry::new();
    assert!(reg.component_def("/nope", false).unwrap().is_none());
    let err = reg.component_def("/nope", true).unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("/nope"));
}

#[test]
fn resolve_ids_builds_bitfield() {
    let mut reg = ComponentRegistry::new();
    for uri in ["/a", "/b", "/c"] {
        reg.register(ComponentDef::new(uri), RegisterOptions::default()).unwrap();
    }
    let idents = [Value::from("/a"), Value::from("/c")];
    let bf = reg.resolve_ids(&idents).unwrap();
    assert_eq!(bf.to_values(), vec![1, 3]);
    assert!(reg.resolve_ids(&[Value::from("/z")]).is_err());
}

// =============================================================================
// JSON and Types
// =============================================================================

#[test]
fn json_defs_and_components() {
    let mut reg = ComponentRegistry::new();
    let def = reg
        .register_json(
            &json!({"uri": "/component/completed", "properties": [{"name": "isComplete", "type": "boolean", "default": false}]}),
            RegisterOptions::default(),
        )
        .unwrap();
    let c = reg
        .component_from_json(&json!({"@c": "/component/completed", "@e": 5}))
        .unwrap();
    assert_eq!(c.def_id(), def.id());
    assert_eq!(c.get("isComplete"), Some(&Value::Bool(false)));
    assert_eq!(c.entity_id().raw(), 5);
    assert!(reg.component_from_json(&json!({"isComplete": true})).is_err());
}

#[derive(Debug)]
struct Timestamped;

impl ComponentType for Timestamped {
    fn name(&self) -> &str {
        "timestamped"
    }

    fn properties(&self) -> Vec<PropertyDef> {
        vec![PropertyDef::new("createdAt")]
    }

    fn prepare(&self, mut attributes: Attributes) -> Attributes {
        attributes.insert("createdAt".into(), Value::Int(0));
        attributes
    }
}

#[test]
fn types_contribute_properties() {
    let mut reg = ComponentRegistry::new();
    assert!(reg.register(ComponentDef::new("/event").with_type("timestamped"), RegisterOptions::default()).is_err());

    reg.register_type(std::sync::Arc::new(Timestamped));
    let def = reg
        .register(
            ComponentDef::new("/event").with_type("timestamped").with_property(PropertyDef::new("kind")),
            RegisterOptions::default(),
        )
        .unwrap();
    assert!(def.property("createdAt").is_some());
    let c = reg.create_component("/event", Attributes::new()).unwrap();
    assert_eq!(c.get("createdAt"), Some(&Value::Int(0)));
}
