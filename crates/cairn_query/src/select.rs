//! Two-pass program evaluation.

use tracing::trace;

use cairn_foundation::{Error, Result};

use crate::stack::QueryStack;
use crate::value::StackValue;
use crate::words::{BUILD_WORDS, FETCH_WORDS, load};

/// Evaluates `program` in a child scope of `stack` and returns the
/// resulting items, which are also left on the parent.
///
/// The first pass runs the build words, turning literals into masks and
/// filter trees and leaving fetch words in place. The second pass replays
/// the result with only the fetch words known, inserting `!fil` after each
/// filter.
///
/// # Errors
/// Returns the first word error, or a stack error naming a word that
/// neither pass knows.
pub fn select(stack: &mut QueryStack<'_>, program: &[StackValue]) -> Result<Vec<StackValue>> {
    stack.push_scope();
    let result = run_passes(stack, program);
    stack.pop_scope();
    let items = result?;
    stack.push_values(items.iter().cloned())?;
    Ok(items)
}

fn run_passes(stack: &mut QueryStack<'_>, program: &[StackValue]) -> Result<Vec<StackValue>> {
    load(stack, BUILD_WORDS);
    stack.push_values(program.iter().cloned())?;
    let built = stack.take_items();
    trace!(items = built.len(), "select first pass");

    stack.clear_words();
    load(stack, FETCH_WORDS);
    let mut replay = Vec::with_capacity(built.len());
    for item in built {
        let is_filter = matches!(item, StackValue::Filter(_));
        replay.push(item);
        if is_filter {
            replay.push(StackValue::word("!fil"));
        }
    }
    stack.push_values(replay)?;

    if let Some(StackValue::Word(w)) = stack.items().iter().find(|v| matches!(v, StackValue::Word(_))) {
        return Err(Error::stack(w.to_string(), "unknown word"));
    }
    Ok(stack.take_items())
}
