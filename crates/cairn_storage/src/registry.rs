//! Component def registry.
//!
//! Assigns def ids (starting at 1) in registration order and resolves
//! identifiers by uri, id, hash or name. Defs are deduplicated by content
//! hash. Registering a new def under an existing uri supersedes the old one
//! for uri lookups while keeping it reachable by id and hash.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use cairn_foundation::{
    Attributes, BitField, ComponentDefId, ComponentId, EntityId, Error, ErrorKind, MAX_COMPONENT_DEFS,
    Result, Value,
};

use crate::component::{Component, DEF_ID_KEY, DEF_URI_KEY, ENTITY_KEY, ID_KEY};
use crate::def::{ComponentDef, ComponentType};
use crate::events::{DefEvent, EventBus};

/// Options for [`ComponentRegistry::register`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Fail with `DefExists` when an identical def is already registered,
    /// instead of returning it.
    pub throw_on_exists: bool,
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self {
            throw_on_exists: true,
        }
    }
}

impl RegisterOptions {
    /// Returns the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether re-registration is an error.
    #[must_use]
    pub fn with_throw_on_exists(mut self, throw: bool) -> Self {
        self.throw_on_exists = throw;
        self
    }
}

/// A component def identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DefIdent {
    /// Numeric def id. Falls back to a hash lookup.
    Id(ComponentDefId),
    /// Content hash.
    Hash(u32),
    /// Uri or name. Falls back to a hex hash or decimal id.
    Text(Arc<str>),
}

impl DefIdent {
    /// Interprets a value as an identifier: integers are ids, strings are
    /// uris or names, and maps use their `@s`, `id`, `hash` or `uri` key.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(n) => u32::try_from(*n).ok().map(Self::Id),
            Value::Float(_) => value
                .as_int()
                .and_then(|n| u32::try_from(n).ok())
                .map(Self::Id),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Map(map) => [DEF_ID_KEY, "id", "hash", "uri"]
                .iter()
                .find_map(|k| map.get(*k))
                .and_then(Self::from_value),
            _ => None,
        }
    }
}

impl From<ComponentDefId> for DefIdent {
    fn from(id: ComponentDefId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for DefIdent {
    fn from(text: &str) -> Self {
        Self::Text(text.into())
    }
}

impl From<&ComponentDef> for DefIdent {
    fn from(def: &ComponentDef) -> Self {
        Self::Id(def.id())
    }
}

impl fmt::Display for DefIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Hash(h) => write!(f, "{h:08x}"),
            Self::Text(t) => write!(f, "{t}"),
        }
    }
}

/// Registry of component defs and component types.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    next_id: ComponentDefId,
    defs: BTreeMap<ComponentDefId, ComponentDef>,
    /// Latest def per uri, in the order those defs were registered.
    by_uri: Vec<(Arc<str>, ComponentDefId)>,
    types: HashMap<Arc<str>, Arc<dyn ComponentType>>,
    events: EventBus<DefEvent>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    /// Registers a component type that defs may name.
    pub fn register_type(&mut self, component_type: Arc<dyn ComponentType>) {
        debug!(name = component_type.name(), "registered component type");
        self.types
            .insert(Arc::from(component_type.name()), component_type);
    }

    /// Returns a registered component type.
    #[must_use]
    pub fn component_type(&self, name: &str) -> Option<&Arc<dyn ComponentType>> {
        self.types.get(name)
    }

    /// Registers a def, returning it with its assigned id.
    ///
    /// A def naming a type inherits that type's properties beneath its own
    /// before its hash is checked for duplicates.
    ///
    /// # Errors
    /// Returns `TypeNotFound` if the def names an unregistered type,
    /// `DefExists` if an identical def is registered and
    /// `options.throw_on_exists` is set, and `InvalidArgument` once def ids
    /// would exceed the bitfield capacity.
    pub fn register(&mut self, def: ComponentDef, options: RegisterOptions) -> Result<ComponentDef> {
        let def = match def.type_name() {
            Some(type_name) => {
                let component_type = self.types.get(type_name).ok_or_else(|| {
                    Error::new(ErrorKind::TypeNotFound {
                        type_name: type_name.to_string(),
                        uri: def.uri().to_string(),
                    })
                })?;
                let base = component_type.properties();
                def.merged_under(base)
            }
            None => def,
        };

        if let Some(existing) = self.by_hash(def.hash()) {
            if options.throw_on_exists {
                return Err(Error::new(ErrorKind::DefExists {
                    uri: existing.uri().to_string(),
                    hash: existing.hash_string(),
                }));
            }
            return Ok(existing.clone());
        }

        let id = self.next_id.max(1);
        if id as usize >= MAX_COMPONENT_DEFS {
            return Err(Error::invalid_argument(format!(
                "cannot register {}: def ids are limited to {MAX_COMPONENT_DEFS}",
                def.uri()
            )));
        }
        self.next_id = id + 1;
        let def = def.with_id(id);

        self.by_uri.retain(|(uri, _)| &**uri != def.uri());
        self.by_uri.push((Arc::from(def.uri()), id));
        self.defs.insert(id, def.clone());

        debug!(id, uri = def.uri(), hash = %def.hash_string(), "registered component def");
        self.events.publish(&DefEvent::Added(def.clone()));
        Ok(def)
    }

    /// Parses and registers a def from JSON.
    ///
    /// # Errors
    /// Returns an error if the JSON is not a def or registration fails.
    pub fn register_json(&mut self, json: &serde_json::Value, options: RegisterOptions) -> Result<ComponentDef> {
        self.register(ComponentDef::from_json(json)?, options)
    }

    /// Removes a def. Its uri no longer resolves afterwards.
    pub fn unregister(&mut self, ident: impl Into<DefIdent>) -> Option<ComponentDef> {
        let id = self.get(ident)?.id();
        let def = self.defs.remove(&id)?;
        self.by_uri.retain(|(uri, _)| &**uri != def.uri());
        debug!(id, uri = def.uri(), "unregistered component def");
        self.events.publish(&DefEvent::Removed(def.clone()));
        Some(def)
    }

    /// Resolves an identifier: by uri, then id, then hash, then name.
    #[must_use]
    pub fn get(&self, ident: impl Into<DefIdent>) -> Option<&ComponentDef> {
        match ident.into() {
            DefIdent::Id(id) => self.defs.get(&id).or_else(|| self.by_hash(id)),
            DefIdent::Hash(hash) => self.by_hash(hash),
            DefIdent::Text(text) => self
                .by_uri(&text)
                .or_else(|| self.defs.values().find(|d| d.uri() == &*text))
                .or_else(|| text.parse::<ComponentDefId>().ok().and_then(|id| self.defs.get(&id)))
                .or_else(|| {
                    (text.len() == 8)
                        .then(|| u32::from_str_radix(&text, 16).ok())
                        .flatten()
                        .and_then(|h| self.by_hash(h))
                })
                .or_else(|| self.defs.values().find(|d| d.name() == &*text)),
        }
    }

    /// Resolves a value identifier (see [`DefIdent::from_value`]).
    #[must_use]
    pub fn get_by_value(&self, ident: &Value) -> Option<&ComponentDef> {
        DefIdent::from_value(ident).and_then(|i| self.get(i))
    }

    /// Resolves an identifier, optionally failing when it is unknown.
    ///
    /// # Errors
    /// Returns `ComponentDefNotFound` if the def is unknown and
    /// `throw_on_not_found` is set.
    pub fn component_def(
        &self,
        ident: impl Into<DefIdent>,
        throw_on_not_found: bool,
    ) -> Result<Option<&ComponentDef>> {
        let ident = ident.into();
        let label = ident.to_string();
        match self.get(ident) {
            Some(def) => Ok(Some(def)),
            None if throw_on_not_found => Err(Error::def_not_found(label)),
            None => Ok(None),
        }
    }

    /// Resolves each identifier and sets its bit.
    ///
    /// # Errors
    /// Returns `ComponentDefNotFound` naming the first unresolved identifier.
    pub fn resolve_ids<'a>(&self, idents: impl IntoIterator<Item = &'a Value>) -> Result<BitField> {
        let mut bf = BitField::new();
        for ident in idents {
            let def = self
                .get_by_value(ident)
                .ok_or_else(|| Error::def_not_found(ident.to_text()))?;
            bf.set(def.id())?;
        }
        Ok(bf)
    }

    /// Returns the current def for each uri, in registration order.
    #[must_use]
    pub fn component_defs(&self) -> Vec<&ComponentDef> {
        self.by_uri
            .iter()
            .filter_map(|(_, id)| self.defs.get(id))
            .collect()
    }

    /// Returns every registered def, including superseded ones.
    #[must_use]
    pub fn all_component_defs(&self) -> Vec<&ComponentDef> {
        self.defs.values().collect()
    }

    /// Maps every def id to its uri.
    #[must_use]
    pub fn component_def_uris(&self) -> BTreeMap<ComponentDefId, Arc<str>> {
        self.defs
            .iter()
            .map(|(id, d)| (*id, Arc::from(d.uri())))
            .collect()
    }

    /// Returns the uri of a def id.
    #[must_use]
    pub fn uri_of(&self, id: ComponentDefId) -> Option<&str> {
        self.defs.get(&id).map(ComponentDef::uri)
    }

    /// Returns the number of registered defs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Creates a component of a def. Supplied attributes override the def's
    /// defaults; the def's type, if any, gets to adjust the result.
    ///
    /// # Errors
    /// Returns `ComponentDefNotFound` if the def is unknown.
    pub fn create_component(&self, ident: impl Into<DefIdent>, attributes: Attributes) -> Result<Component> {
        let ident = ident.into();
        let label = ident.to_string();
        let def = self.get(ident).ok_or_else(|| Error::def_not_found(label))?;
        let mut attrs = def.default_attributes();
        for (k, v) in attributes {
            attrs.insert(k, v);
        }
        if let Some(component_type) = def.type_name().and_then(|t| self.types.get(t)) {
            attrs = component_type.prepare(attrs);
        }
        Ok(Component::new(def.id(), attrs))
    }

    /// Creates a component from JSON carrying `@c` (uri) or `@s` (def id),
    /// optionally `@i` and `@e`, plus attributes.
    ///
    /// # Errors
    /// Returns an error if the JSON is not an object or names no known def.
    pub fn component_from_json(&self, json: &serde_json::Value) -> Result<Component> {
        let Value::Map(mut attrs) = Value::from_json(json) else {
            return Err(Error::invalid_argument(format!("component json must be an object: {json}")));
        };
        let ident = attrs
            .remove(DEF_URI_KEY)
            .or_else(|| attrs.remove(DEF_ID_KEY))
            .ok_or_else(|| Error::invalid_argument(format!("component json names no def: {json}")))?;
        // both keys are identity, not attributes
        attrs.remove(DEF_ID_KEY);
        let id = attrs.remove(ID_KEY).and_then(|v| v.as_int()).unwrap_or(0);
        let entity = attrs.remove(ENTITY_KEY).and_then(|v| v.as_int()).unwrap_or(0);
        let def = self
            .get_by_value(&ident)
            .ok_or_else(|| Error::def_not_found(ident.to_text()))?;
        let component = self.create_component(def.id(), attrs)?;
        Ok(component
            .with_id(ComponentId::try_from(id).unwrap_or(0))
            .with_entity_id(EntityId::from_raw(u64::try_from(entity).unwrap_or(0))))
    }

    /// Returns a receiver of def notifications.
    pub fn subscribe(&mut self) -> flume::Receiver<DefEvent> {
        self.events.subscribe()
    }

    fn by_uri(&self, uri: &str) -> Option<&ComponentDef> {
        self.by_uri
            .iter()
            .find(|(u, _)| &**u == uri)
            .and_then(|(_, id)| self.defs.get(id))
    }

    fn by_hash(&self, hash: u32) -> Option<&ComponentDef> {
        self.defs.values().find(|d| d.hash() == hash)
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("defs", &self.defs.values().collect::<Vec<_>>())
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
