use std::sync::Arc;

use cairn_foundation::{Attributes, BitField, ComponentDefId, EntityId, Error, Result, Value, pointer};
use cairn_storage::{ComponentRegistry, Entity};

use crate::source::QuerySource;
use crate::stack::QueryStack;
use crate::value::{SType, StackValue};

use super::build::resolve_attr;

fn id_value(id: EntityId) -> StackValue {
    StackValue::Value(Value::from(id.raw()))
}

fn all_ids(source: &dyn QuerySource) -> Vec<EntityId> {
    source.match_entities(None)
}

/// Pops a preceding entity or list of entities, if any.
fn pop_entity_context(stack: &mut QueryStack<'_>) -> Option<Vec<EntityId>> {
    match stack.peek()? {
        StackValue::Entity(e) => {
            let id = e.id();
            stack.pop_if(SType::Entity);
            Some(vec![id])
        }
        StackValue::List(items) => {
            let ids = items.iter().filter_map(StackValue::entity_id).collect();
            stack.pop_if(SType::List);
            Some(ids)
        }
        _ => None,
    }
}

/// Returns true if the top of the stack names entities: an entity, or a
/// list whose every item resolves to an entity id.
fn has_entity_context(stack: &QueryStack<'_>) -> bool {
    match stack.peek() {
        Some(StackValue::Entity(_)) => true,
        Some(StackValue::List(items)) => items.iter().all(|i| i.entity_id().is_some()),
        _ => false,
    }
}

/// `!fil`: walks a filter over the entities of the preceding context (a
/// mask, an entity or entity list, or every entity) and pushes the matches
/// in ascending id order.
///
/// # Errors
/// Returns a stack error if the top is not a filter.
pub fn apply_filter(stack: &mut QueryStack<'_>, op: &str) -> Result<Option<StackValue>> {
    let filter = match stack.pop(op)? {
        StackValue::Filter(f) => f,
        other => return Err(Error::stack(op, format!("expected filter, got {}", other.stype()))),
    };
    let source = stack.source();
    let universe = if let Some(StackValue::BitField(bf)) = stack.pop_if(SType::BitField) {
        source.match_entities(Some(&bf))
    } else if has_entity_context(stack) {
        pop_entity_context(stack).unwrap_or_default()
    } else {
        stack.pop_if(SType::EntitySet);
        all_ids(source)
    };
    let ids = filter.apply(source, &universe)?;
    Ok(Some(StackValue::List(
        ids.into_iter()
            .filter_map(|id| source.entity(id))
            .map(|e| StackValue::Entity(e.clone()))
            .collect(),
    )))
}

/// `@e` and `@eid`: entities (or their ids) selected by a mask, a single
/// id, a list of ids or `all`. A single missing id yields `false`.
///
/// # Errors
/// Returns a stack error for an unusable selector.
pub fn fetch_entities(stack: &mut QueryStack<'_>, op: &str) -> Result<Option<StackValue>> {
    let source = stack.source();
    let ids_only = op == "@eid";
    let emit = |e: &Entity| {
        if ids_only { id_value(e.id()) } else { StackValue::Entity(e.clone()) }
    };
    let ids = if stack.is_empty() {
        all_ids(source)
    } else {
        match stack.pop(op)? {
            StackValue::BitField(bf) => source.match_entities(Some(&bf)),
            StackValue::EntitySet => all_ids(source),
            StackValue::Value(Value::String(s)) if &*s == "all" => all_ids(source),
            single @ (StackValue::Value(Value::Int(_)) | StackValue::Entity(_)) => {
                let found = single.entity_id().and_then(|id| source.entity(id));
                return Ok(Some(found.map_or(StackValue::Value(Value::Bool(false)), emit)));
            }
            StackValue::List(items) => items.iter().filter_map(StackValue::entity_id).collect(),
            other => {
                return Err(Error::stack(op, format!("cannot select entities from {}", other.stype())));
            }
        }
    };
    Ok(Some(StackValue::List(
        ids.into_iter().filter_map(|id| source.entity(id)).map(emit).collect(),
    )))
}

/// `@c`: components of the preceding entity or entity list (or of every
/// entity), restricted to a preceding def mask, ordered by owning entity.
///
/// # Errors
/// Never fails.
pub fn fetch_components(stack: &mut QueryStack<'_>, _op: &str) -> Result<Option<StackValue>> {
    let source = stack.source();
    let mask = match stack.pop_if(SType::BitField) {
        Some(StackValue::BitField(bf)) => Some(bf),
        _ => None,
    };
    let mut entities: Vec<&Entity> = match pop_entity_context(stack) {
        Some(ids) => ids.into_iter().filter_map(|id| source.entity(id)).collect(),
        None => source.entities().collect(),
    };
    entities.sort_by_key(|e| e.id());
    let wanted = |def_id: ComponentDefId| mask.as_ref().is_none_or(|m: &BitField| m.is_all_set() || m.get(def_id));
    Ok(Some(StackValue::List(
        entities
            .into_iter()
            .flat_map(Entity::components)
            .filter(|c| wanted(c.def_id()))
            .map(|c| StackValue::Component(c.clone()))
            .collect(),
    )))
}

/// `@ca`: one attribute across entities, `null` where an entity lacks it.
/// Entities come from a preceding entity, list or mask; by default every
/// entity holding the def.
///
/// # Errors
/// Returns a stack error if the top is not a component attribute.
pub fn fetch_attributes(stack: &mut QueryStack<'_>, op: &str) -> Result<Option<StackValue>> {
    let source = stack.source();
    let (bf, ptr) = match stack.pop(op)? {
        StackValue::ComponentAttr(bf, ptr) => (bf, ptr),
        StackValue::Value(Value::String(text)) => resolve_attr(stack, op, &text)?,
        other => {
            return Err(Error::stack(op, format!("expected component attribute, got {}", other.stype())));
        }
    };
    let Some(def_id) = bf.to_values().first().copied() else {
        return Err(Error::stack(op, "component attribute has no def"));
    };
    let ids = match stack.pop_if(SType::BitField) {
        Some(StackValue::BitField(mask)) => source.match_entities(Some(&mask)),
        _ => pop_entity_context(stack).unwrap_or_else(|| source.match_entities(Some(&bf))),
    };
    Ok(Some(StackValue::List(
        ids.into_iter()
            .map(|id| {
                source
                    .entity(id)
                    .and_then(|e| e.component(def_id))
                    .and_then(|c| c.attribute(&ptr))
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .map(StackValue::Value)
            .collect(),
    )))
}

fn as_map(registry: &ComponentRegistry, op: &str, item: &StackValue) -> Result<Value> {
    match item {
        StackValue::Map(m) => Ok(Value::Map(m.clone())),
        StackValue::Value(v @ Value::Map(_)) => Ok(v.clone()),
        StackValue::Component(c) => Ok(c.to_value(registry.uri_of(c.def_id()))),
        StackValue::Entity(e) => {
            let mut map = Attributes::new();
            map.insert(Arc::from("@e"), Value::from(e.id().raw()));
            for c in e.components() {
                let key = registry
                    .uri_of(c.def_id())
                    .map_or_else(|| c.def_id().to_string(), str::to_owned);
                map.insert(Arc::from(key.as_str()), c.to_value(None));
            }
            Ok(Value::Map(map))
        }
        other => Err(Error::stack(op, format!("expected map, got {}", other.stype()))),
    }
}

fn lookup<'v>(map: &'v Value, key: &str) -> Option<&'v Value> {
    if key.starts_with('/') {
        pointer::get(map, key)
    } else {
        map.as_map().and_then(|m| m.get(key))
    }
}

fn key_text(op: &str, key: &StackValue) -> Result<Arc<str>> {
    match key {
        StackValue::Value(Value::String(s)) | StackValue::Word(s) => Ok(s.clone()),
        other => Err(Error::stack(op, format!("expected key, got {}", other.stype()))),
    }
}

/// `pluck`: with one key, the key's value from each map (unwrapped when
/// there is one map); with a list of keys, a map per input holding just
/// those keys.
///
/// # Errors
/// Returns a stack error if an input is not map-like.
pub fn pluck(stack: &mut QueryStack<'_>, op: &str) -> Result<Option<StackValue>> {
    let registry = stack.source().registry();
    let key = stack.pop(op)?;
    let items = match stack.pop(op)? {
        StackValue::List(items) => items,
        other => vec![other],
    };
    let maps = items
        .iter()
        .map(|item| as_map(registry, op, item))
        .collect::<Result<Vec<_>>>()?;

    if let StackValue::List(keys) = &key {
        let keys = keys.iter().map(|k| key_text(op, k)).collect::<Result<Vec<_>>>()?;
        let mut out = Vec::with_capacity(maps.len());
        for map in &maps {
            let mut picked = Value::Map(Attributes::new());
            for k in &keys {
                if let Some(v) = lookup(map, k) {
                    let ptr = if k.starts_with('/') { k.to_string() } else { format!("/{k}") };
                    pointer::set(&mut picked, &ptr, v.clone())?;
                }
            }
            out.push(StackValue::from(picked));
        }
        return Ok(Some(StackValue::List(out)));
    }

    let key = key_text(op, &key)?;
    let mut out: Vec<StackValue> = maps
        .iter()
        .map(|m| StackValue::Value(lookup(m, &key).cloned().unwrap_or(Value::Null)))
        .collect();
    if out.len() == 1 {
        return Ok(out.pop());
    }
    Ok(Some(StackValue::List(out)))
}

/// `limit`: `list offset count limit` keeps `count` items starting at
/// `offset`.
///
/// # Errors
/// Returns a stack error if offset or count is not a non-negative integer.
pub fn limit(stack: &mut QueryStack<'_>, op: &str) -> Result<Option<StackValue>> {
    let mut bound = |name: &str| -> Result<usize> {
        stack
            .pop(op)?
            .to_value()
            .and_then(|v| v.as_int())
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| Error::stack(op, format!("{name} must be a non-negative integer")))
    };
    let count = bound("limit")?;
    let offset = bound("offset")?;
    let StackValue::List(items) = stack.pop(op)? else {
        return Err(Error::stack(op, "expected list"));
    };
    Ok(Some(StackValue::List(
        items.into_iter().skip(offset).take(count).collect(),
    )))
}
