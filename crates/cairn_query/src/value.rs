//! Typed stack values.

use std::fmt;
use std::sync::Arc;

use cairn_foundation::{Attributes, BitField, EntityId, Value};
use cairn_storage::{Component, ComponentDef, Entity};

use crate::filter::Filter;

/// The type tag of a [`StackValue`], used in word signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SType {
    /// A plain [`Value`].
    Value,
    /// A list of stack values.
    List,
    /// A map of attribute values.
    Map,
    /// A def mask.
    BitField,
    /// An entity.
    Entity,
    /// The source entity set.
    EntitySet,
    /// A component.
    Component,
    /// A component def.
    ComponentDef,
    /// A def and attribute pointer.
    ComponentAttr,
    /// A predicate tree awaiting `!fil`.
    Filter,
    /// An unevaluated word.
    Word,
    /// Matches any type in a signature.
    Any,
}

impl SType {
    /// Returns true if a value of type `actual` satisfies this tag.
    #[must_use]
    pub fn accepts(self, actual: Self) -> bool {
        self == Self::Any || self == actual
    }

    /// Short code used in diagnostics.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Value => "%v",
            Self::List => "%[]",
            Self::Map => "%{}",
            Self::BitField => "%bf",
            Self::Entity => "%e",
            Self::EntitySet => "%es",
            Self::Component => "%c",
            Self::ComponentDef => "%d",
            Self::ComponentAttr => "%ca",
            Self::Filter => "%|",
            Self::Word => "%w",
            Self::Any => "%*",
        }
    }
}

impl fmt::Display for SType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A value on the query stack.
#[derive(Clone, Debug, PartialEq)]
pub enum StackValue {
    /// A plain value.
    Value(Value),
    /// A list of stack values.
    List(Vec<StackValue>),
    /// A map of values.
    Map(Attributes),
    /// A def mask.
    BitField(BitField),
    /// An entity.
    Entity(Entity),
    /// The source entity set as a whole.
    EntitySet,
    /// A component.
    Component(Component),
    /// A component def.
    ComponentDef(ComponentDef),
    /// A one-def mask and an attribute pointer.
    ComponentAttr(BitField, Arc<str>),
    /// A predicate tree.
    Filter(Filter),
    /// A word, executed when pushed if the dictionary knows it.
    Word(Arc<str>),
}

impl StackValue {
    /// Returns the type tag.
    #[must_use]
    pub const fn stype(&self) -> SType {
        match self {
            Self::Value(_) => SType::Value,
            Self::List(_) => SType::List,
            Self::Map(_) => SType::Map,
            Self::BitField(_) => SType::BitField,
            Self::Entity(_) => SType::Entity,
            Self::EntitySet => SType::EntitySet,
            Self::Component(_) => SType::Component,
            Self::ComponentDef(_) => SType::ComponentDef,
            Self::ComponentAttr(..) => SType::ComponentAttr,
            Self::Filter(_) => SType::Filter,
            Self::Word(_) => SType::Word,
        }
    }

    /// Creates a word.
    #[must_use]
    pub fn word(name: &str) -> Self {
        Self::Word(Arc::from(name))
    }

    /// Creates a string value.
    #[must_use]
    pub fn string(text: &str) -> Self {
        Self::Value(Value::String(Arc::from(text)))
    }

    /// Returns the entity id this value denotes: an entity, or an integer
    /// value read as a raw id.
    #[must_use]
    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            Self::Entity(e) => Some(e.id()),
            Self::Value(v) => v
                .as_int()
                .and_then(|n| u64::try_from(n).ok())
                .map(EntityId::from_raw),
            Self::Component(c) => Some(c.entity_id()),
            _ => None,
        }
    }

    /// Returns true if this value carries a result: a non-empty list or
    /// map, a truthy value, or any entity-set object.
    #[must_use]
    pub fn is_non_empty(&self) -> bool {
        match self {
            Self::Value(v) => v.is_truthy(),
            Self::List(items) => !items.is_empty(),
            Self::Map(m) => !m.is_empty(),
            Self::Word(_) => false,
            _ => true,
        }
    }

    /// Converts to a plain value where one exists. Lists convert when all
    /// their items do.
    #[must_use]
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Self::Value(v) => Some(v.clone()),
            Self::Map(m) => Some(Value::Map(m.clone())),
            Self::List(items) => items
                .iter()
                .map(Self::to_value)
                .collect::<Option<im::Vector<Value>>>()
                .map(Value::List),
            Self::Component(c) => Some(c.to_value(None)),
            _ => None,
        }
    }
}

impl From<Value> for StackValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl fmt::Display for StackValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v @ Value::String(s)) if s.starts_with('/') => write!(f, "{v}"),
            Self::Value(v) => write!(f, "{v:?}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(m) => write!(f, "{}", Value::Map(m.clone()).canonical_json()),
            Self::BitField(bf) => write!(f, "({} {bf:?})", SType::BitField),
            Self::Entity(e) => write!(f, "({} {})", SType::Entity, e.id()),
            Self::EntitySet => f.write_str(SType::EntitySet.code()),
            Self::Component(c) => write!(f, "({} {})", SType::Component, c.id()),
            Self::ComponentDef(d) => write!(f, "({} {})", SType::ComponentDef, d.uri()),
            Self::ComponentAttr(bf, ptr) => {
                write!(f, "({} {:?} {ptr})", SType::ComponentAttr, bf.to_values())
            }
            Self::Filter(filter) => write!(f, "({} {filter})", SType::Filter),
            Self::Word(w) => f.write_str(w),
        }
    }
}
