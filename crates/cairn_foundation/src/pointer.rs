//! RFC 6901 JSON pointers over [`Value`].
//!
//! `get` follows map keys and list indices. `set` creates intermediate maps
//! (or lists, when the next token is an index or `-`) as it descends.

use std::sync::Arc;

use im::Vector;

use crate::{Attributes, Error, Result, Value};

/// Splits a pointer into unescaped reference tokens.
///
/// The empty pointer refers to the whole document and yields no tokens.
///
/// # Errors
/// Returns an error if a non-empty pointer does not start with `/`.
pub fn tokens(ptr: &str) -> Result<Vec<String>> {
    if ptr.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = ptr.strip_prefix('/') else {
        return Err(Error::invalid_argument(format!(
            "invalid json pointer '{ptr}'"
        )));
    };
    Ok(rest
        .split('/')
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect())
}

/// Looks up the value a pointer refers to.
#[must_use]
pub fn get<'a>(root: &'a Value, ptr: &str) -> Option<&'a Value> {
    let tokens = tokens(ptr).ok()?;
    tokens.iter().try_fold(root, |current, token| step(current, token))
}

/// Follows one reference token.
#[must_use]
pub fn step<'a>(current: &'a Value, token: &str) -> Option<&'a Value> {
    match current {
        Value::Map(map) => map.get(token),
        Value::List(items) => token.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Writes `value` at the location a pointer refers to.
///
/// # Errors
/// Returns an error if the pointer is malformed or descends through a
/// scalar.
pub fn set(root: &mut Value, ptr: &str, value: Value) -> Result<()> {
    let tokens = tokens(ptr)?;
    set_tokens(root, &tokens, value)
}

fn set_tokens(current: &mut Value, tokens: &[String], value: Value) -> Result<()> {
    let Some((token, rest)) = tokens.split_first() else {
        *current = value;
        return Ok(());
    };

    if current.is_null() {
        *current = empty_container(token);
    }

    match current {
        Value::Map(map) => {
            let key: Arc<str> = token.as_str().into();
            let mut child = map.get(&key).cloned().unwrap_or_else(|| {
                rest.first().map_or(Value::Null, |next| empty_container(next))
            });
            set_tokens(&mut child, rest, value)?;
            map.insert(key, child);
            Ok(())
        }
        Value::List(items) => {
            let index = if token == "-" {
                items.len()
            } else {
                token.parse::<usize>().map_err(|_| {
                    Error::invalid_argument(format!("invalid list index '{token}'"))
                })?
            };
            while items.len() <= index {
                items.push_back(Value::Null);
            }
            let mut child = items[index].clone();
            set_tokens(&mut child, rest, value)?;
            items.set(index, child);
            Ok(())
        }
        other => Err(Error::invalid_argument(format!(
            "cannot set '{token}' on {}",
            other.type_name()
        ))),
    }
}

fn empty_container(next_token: &str) -> Value {
    if next_token == "-" || next_token.parse::<usize>().is_ok() {
        Value::List(Vector::new())
    } else {
        Value::Map(Attributes::new())
    }
}
