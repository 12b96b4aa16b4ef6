use std::sync::Arc;

use tracing::debug;

use cairn_foundation::{BitField, Error, Result, Value};

use crate::filter::Filter;
use crate::stack::QueryStack;
use crate::value::StackValue;

/// `!bf`: resolves def identifiers (uris, ids, hashes or names) to a mask.
/// The string `all` yields the wildcard mask.
///
/// # Errors
/// Returns a stack error naming the first unknown identifier.
pub fn build_bitfield(stack: &mut QueryStack<'_>, op: &str) -> Result<Option<StackValue>> {
    let registry = stack.source().registry();
    let idents = match stack.pop(op)? {
        StackValue::ComponentDef(def) => {
            return Ok(Some(StackValue::BitField(BitField::create([def.id()])?)));
        }
        StackValue::Value(Value::String(s)) if &*s == "all" => {
            return Ok(Some(StackValue::BitField(BitField::all())));
        }
        StackValue::List(items) => items,
        other => vec![other],
    };
    let mut bf = BitField::new();
    for ident in idents {
        let def = match &ident {
            StackValue::ComponentDef(def) => Some(def),
            StackValue::Value(v) => registry.get_by_value(v),
            _ => None,
        }
        .ok_or_else(|| Error::stack(op, format!("def not found: {ident}")))?;
        bf.set(def.id())?;
    }
    Ok(Some(StackValue::BitField(bf)))
}

/// `!ca`: parses `uri#pointer` into a one-def mask and attribute pointer.
///
/// # Errors
/// Returns a stack error if the text has no `#` or the uri is unknown.
pub fn component_attr(stack: &mut QueryStack<'_>, op: &str) -> Result<Option<StackValue>> {
    let value = stack.pop(op)?;
    let text = match &value {
        StackValue::Value(Value::String(s)) => s.clone(),
        other => {
            return Err(Error::stack(op, format!("expected uri#pointer, got {}", other.stype())));
        }
    };
    let (bf, pointer) = resolve_attr(stack, op, &text)?;
    Ok(Some(StackValue::ComponentAttr(bf, pointer)))
}

pub(crate) fn resolve_attr(stack: &QueryStack<'_>, op: &str, text: &str) -> Result<(BitField, Arc<str>)> {
    let (uri, pointer) = text
        .split_once('#')
        .ok_or_else(|| Error::stack(op, format!("expected uri#pointer, got {text}")))?;
    let def = stack
        .source()
        .registry()
        .get(uri)
        .ok_or_else(|| Error::stack(op, format!("def not found: {uri}")))?;
    Ok((BitField::create([def.id()])?, Arc::from(pointer)))
}

/// `define`: `value name define` makes `name` push `value`.
///
/// # Errors
/// Returns a stack error if the name is not a word or string.
pub fn define(stack: &mut QueryStack<'_>, op: &str) -> Result<Option<StackValue>> {
    let name = match stack.pop(op)? {
        StackValue::Word(w) | StackValue::Value(Value::String(w)) => w,
        other => return Err(Error::stack(op, format!("expected name, got {}", other.stype()))),
    };
    let value = stack.pop(op)?;
    stack.define(&name, value);
    Ok(None)
}

/// `prints`: logs the stack.
///
/// # Errors
/// Never fails.
pub fn prints(stack: &mut QueryStack<'_>, _op: &str) -> Result<Option<StackValue>> {
    debug!(stack = %stack, "prints");
    Ok(None)
}

/// Comparison and logical words: pop two operands and build a filter node.
///
/// # Errors
/// See [`Filter::build`].
pub fn logical(stack: &mut QueryStack<'_>, op: &str) -> Result<Option<StackValue>> {
    let right = stack.pop(op)?;
    let left = stack.pop(op)?;
    Filter::build(op, left, right).map(|f| Some(StackValue::Filter(f)))
}
