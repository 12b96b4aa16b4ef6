//! Components: attribute bundles owned by entities.

use std::sync::Arc;

use cairn_foundation::{Attributes, ComponentDefId, ComponentId, EntityId, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// JSON key carrying the component id.
pub const ID_KEY: &str = "@i";
/// JSON key carrying the owning entity id.
pub const ENTITY_KEY: &str = "@e";
/// JSON key carrying the def id.
pub const DEF_ID_KEY: &str = "@s";
/// JSON key carrying the def uri.
pub const DEF_URI_KEY: &str = "@c";

/// An attribute bundle of one def, attached to at most one entity.
///
/// A component id of 0 means the id has not been allocated yet; an entity id
/// of [`EntityId::NONE`] means the component is unattached.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Component {
    id: ComponentId,
    entity_id: EntityId,
    def_id: ComponentDefId,
    attributes: Attributes,
}

impl Component {
    /// Creates an unattached component.
    #[must_use]
    pub fn new(def_id: ComponentDefId, attributes: Attributes) -> Self {
        Self {
            id: 0,
            entity_id: EntityId::NONE,
            def_id,
            attributes,
        }
    }

    /// Returns this component with the given id.
    #[must_use]
    pub fn with_id(mut self, id: ComponentId) -> Self {
        self.id = id;
        self
    }

    /// Returns this component attached to the given entity.
    #[must_use]
    pub fn with_entity_id(mut self, entity_id: EntityId) -> Self {
        self.entity_id = entity_id;
        self
    }

    /// Returns this component with one attribute set.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Returns the component id.
    #[must_use]
    pub const fn id(&self) -> ComponentId {
        self.id
    }

    /// Returns the owning entity id.
    #[must_use]
    pub const fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    /// Returns the def id.
    #[must_use]
    pub const fn def_id(&self) -> ComponentDefId {
        self.def_id
    }

    /// Returns the attributes.
    #[must_use]
    pub const fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns one attribute.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Sets one attribute.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(Arc::from(key), value.into());
    }

    /// Reads an attribute by JSON pointer (`/a/b`) or plain key.
    #[must_use]
    pub fn attribute(&self, ptr: &str) -> Option<&Value> {
        if !ptr.starts_with('/') {
            return self.attributes.get(ptr);
        }
        let tokens = cairn_foundation::pointer::tokens(ptr).ok()?;
        let (first, rest) = tokens.split_first()?;
        rest.iter()
            .try_fold(self.attributes.get(first.as_str())?, |current, token| {
                cairn_foundation::pointer::step(current, token)
            })
    }

    pub(crate) fn set_id(&mut self, id: ComponentId) {
        self.id = id;
    }

    pub(crate) fn set_entity_id(&mut self, entity_id: EntityId) {
        self.entity_id = entity_id;
    }

    /// Merges `other`'s attributes onto this component's.
    pub fn apply(&mut self, other: &Attributes) {
        for (k, v) in other {
            self.attributes.insert(k.clone(), v.clone());
        }
    }

    /// Returns the attributes plus the `@i`, `@e`, `@s` (and, when given,
    /// `@c`) keys as a map value.
    #[must_use]
    pub fn to_value(&self, def_uri: Option<&str>) -> Value {
        let mut map = self.attributes.clone();
        map.insert(Arc::from(ID_KEY), Value::from(self.id));
        map.insert(Arc::from(ENTITY_KEY), Value::from(self.entity_id.raw()));
        map.insert(Arc::from(DEF_ID_KEY), Value::from(self.def_id));
        if let Some(uri) = def_uri {
            map.insert(Arc::from(DEF_URI_KEY), Value::from(uri));
        }
        Value::Map(map)
    }

    /// JSON form of [`Component::to_value`].
    #[must_use]
    pub fn to_json(&self, def_uri: Option<&str>) -> serde_json::Value {
        self.to_value(def_uri).to_json()
    }
}
