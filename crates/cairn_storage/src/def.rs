//! Component definitions.
//!
//! A [`ComponentDef`] describes a kind of component: its uri, declared
//! properties (with defaults), and an optional [`ComponentType`] name. Defs
//! are content-addressed: the hash covers the uri and the properties.

use std::fmt;
use std::sync::Arc;

use cairn_foundation::{Attributes, ComponentDefId, Error, Result, Value, hash};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A declared component property.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PropertyDef {
    /// Attribute name.
    pub name: Arc<str>,
    /// Declared type name, e.g. `"boolean"`.
    pub type_name: Option<Arc<str>>,
    /// Value used when a component is created without this attribute.
    pub default: Value,
    /// Whether adapters should persist this attribute.
    pub persist: bool,
}

impl PropertyDef {
    /// Creates an untyped property with no default.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            default: Value::Null,
            persist: true,
        }
    }

    /// Sets the declared type.
    #[must_use]
    pub fn with_type(mut self, type_name: impl Into<Arc<str>>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    /// Marks the property as transient.
    #[must_use]
    pub fn transient(mut self) -> Self {
        self.persist = false;
        self
    }

    /// Parses a property from either a bare name or an object with `name`,
    /// `type`, `default` and `persist` keys.
    ///
    /// # Errors
    /// Returns an error if the value is neither form.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::String(name) => Ok(Self::new(name.as_str())),
            serde_json::Value::Object(obj) => {
                let name = obj
                    .get("name")
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| Error::invalid_argument(format!("property without name: {json}")))?;
                let mut prop = Self::new(name);
                if let Some(ty) = obj.get("type").and_then(serde_json::Value::as_str) {
                    prop = prop.with_type(ty);
                }
                if let Some(default) = obj.get("default") {
                    prop.default = Value::from_json(default);
                }
                if let Some(persist) = obj.get("persist").and_then(serde_json::Value::as_bool) {
                    prop.persist = persist;
                }
                Ok(prop)
            }
            other => Err(Error::invalid_argument(format!("invalid property: {other}"))),
        }
    }

    /// Returns the JSON form used for hashing and display.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("name".into(), self.name.as_ref().into());
        if let Some(ty) = &self.type_name {
            obj.insert("type".into(), ty.as_ref().into());
        }
        if !self.default.is_null() {
            obj.insert("default".into(), self.default.to_json());
        }
        if !self.persist {
            obj.insert("persist".into(), false.into());
        }
        serde_json::Value::Object(obj)
    }
}

/// A registered (or registrable) component definition.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ComponentDef {
    id: ComponentDefId,
    uri: Arc<str>,
    name: Arc<str>,
    type_name: Option<Arc<str>>,
    properties: Vec<PropertyDef>,
    hash: u32,
}

impl ComponentDef {
    /// Creates an unregistered def (id 0) with no properties.
    #[must_use]
    pub fn new(uri: impl Into<Arc<str>>) -> Self {
        let uri = uri.into();
        let name = name_from_uri(&uri).into();
        let mut def = Self {
            id: 0,
            uri,
            name,
            type_name: None,
            properties: Vec::new(),
            hash: 0,
        };
        def.rehash();
        def
    }

    /// Adds a property, replacing any existing property of the same name.
    #[must_use]
    pub fn with_property(mut self, property: PropertyDef) -> Self {
        self.put_property(property);
        self.rehash();
        self
    }

    /// Adds several properties.
    #[must_use]
    pub fn with_properties(mut self, properties: impl IntoIterator<Item = PropertyDef>) -> Self {
        for p in properties {
            self.put_property(p);
        }
        self.rehash();
        self
    }

    /// Sets the component type this def is built from.
    #[must_use]
    pub fn with_type(mut self, type_name: impl Into<Arc<str>>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Overrides the display name derived from the uri.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    pub(crate) fn with_id(mut self, id: ComponentDefId) -> Self {
        self.id = id;
        self
    }

    /// Returns this def with `base` properties placed beneath its own. Own
    /// properties win on name clashes.
    #[must_use]
    pub fn merged_under(mut self, base: Vec<PropertyDef>) -> Self {
        let own = std::mem::replace(&mut self.properties, base);
        for p in own {
            self.put_property(p);
        }
        self.rehash();
        self
    }

    /// Parses a def from JSON such as
    /// `{"uri": "/component/completed", "properties": [{"name": "isComplete", "default": false}]}`.
    ///
    /// # Errors
    /// Returns an error if the uri is missing or a property is malformed.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let uri = json
            .get("uri")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::invalid_argument(format!("invalid component def: {json}")))?;
        let mut def = Self::new(uri);
        if let Some(name) = json.get("name").and_then(serde_json::Value::as_str) {
            def = def.with_name(name);
        }
        if let Some(ty) = json.get("type").and_then(serde_json::Value::as_str) {
            def = def.with_type(ty);
        }
        if let Some(props) = json.get("properties").and_then(serde_json::Value::as_array) {
            let props = props
                .iter()
                .map(PropertyDef::from_json)
                .collect::<Result<Vec<_>>>()?;
            def = def.with_properties(props);
        }
        Ok(def)
    }

    /// Returns the def id (0 until registered).
    #[must_use]
    pub const fn id(&self) -> ComponentDefId {
        self.id
    }

    /// Returns the uri.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the component type name, if any.
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Returns the declared properties in order.
    #[must_use]
    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    /// Returns a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| &*p.name == name)
    }

    /// Returns the content hash.
    #[must_use]
    pub const fn hash(&self) -> u32 {
        self.hash
    }

    /// Returns the content hash as eight hex digits.
    #[must_use]
    pub fn hash_string(&self) -> String {
        hash::hash_to_string(self.hash)
    }

    /// Returns the attributes a fresh component of this def starts with:
    /// every property that declares a non-null default.
    #[must_use]
    pub fn default_attributes(&self) -> Attributes {
        self.properties
            .iter()
            .filter(|p| !p.default.is_null())
            .map(|p| (p.name.clone(), p.default.clone()))
            .collect()
    }

    /// Returns the JSON form, including the id once registered.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        if self.id != 0 {
            obj.insert("id".into(), self.id.into());
        }
        obj.insert("uri".into(), self.uri.as_ref().into());
        obj.insert("name".into(), self.name.as_ref().into());
        if let Some(ty) = &self.type_name {
            obj.insert("type".into(), ty.as_ref().into());
        }
        obj.insert("hash".into(), self.hash_string().into());
        obj.insert(
            "properties".into(),
            self.properties.iter().map(PropertyDef::to_json).collect(),
        );
        serde_json::Value::Object(obj)
    }

    fn put_property(&mut self, property: PropertyDef) {
        if let Some(existing) = self.properties.iter_mut().find(|p| p.name == property.name) {
            *existing = property;
        } else {
            self.properties.push(property);
        }
    }

    fn rehash(&mut self) {
        let identity = serde_json::json!({
            "uri": self.uri.as_ref(),
            "properties": self.properties.iter().map(PropertyDef::to_json).collect::<Vec<_>>(),
        });
        self.hash = hash::hash_str(&identity.to_string());
    }
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentDef({} {} {})", self.id, self.uri, self.hash_string())
    }
}

/// A component kind known at compile time, registered once by name and
/// consulted whenever a def declaring that type is registered or
/// instantiated.
pub trait ComponentType: Send + Sync + fmt::Debug {
    /// The type name defs refer to.
    fn name(&self) -> &str;

    /// Properties every def of this type inherits.
    fn properties(&self) -> Vec<PropertyDef> {
        Vec::new()
    }

    /// Adjusts the attributes of a newly created component.
    fn prepare(&self, attributes: Attributes) -> Attributes {
        attributes
    }
}

/// `/component/channel_member` becomes `ChannelMember`.
fn name_from_uri(uri: &str) -> String {
    let last = uri.rsplit('/').find(|s| !s.is_empty()).unwrap_or(uri);
    last.split(['_', '-'])
        .filter(|s| !s.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect()
}
