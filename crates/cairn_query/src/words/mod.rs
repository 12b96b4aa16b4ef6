//! The query dictionary.
//!
//! [`select`](crate::select) loads [`BUILD_WORDS`] for the first pass and
//! [`FETCH_WORDS`] for the second.

mod build;
mod fetch;

use crate::stack::{QueryStack, WordFn};
use crate::value::SType;

pub use build::{build_bitfield, component_attr, define, logical, prints};
pub use fetch::{apply_filter, fetch_attributes, fetch_components, fetch_entities, limit, pluck};

/// A dictionary row: name, implementation, signature.
pub type WordDef = (&'static str, WordFn, &'static [SType]);

/// Words that turn literals into masks, attributes and filter trees.
pub const BUILD_WORDS: &[WordDef] = &[
    ("!bf", build_bitfield, &[SType::List]),
    ("!bf", build_bitfield, &[SType::Value]),
    ("!bf", build_bitfield, &[SType::ComponentDef]),
    ("!ca", component_attr, &[SType::Value]),
    ("define", define, &[SType::Any, SType::Any]),
    ("prints", prints, &[]),
    ("==", logical, &[SType::Any, SType::Any]),
    ("!=", logical, &[SType::Any, SType::Any]),
    (">", logical, &[SType::Any, SType::Any]),
    (">=", logical, &[SType::Any, SType::Any]),
    ("<", logical, &[SType::Any, SType::Any]),
    ("<=", logical, &[SType::Any, SType::Any]),
    ("and", logical, &[SType::Any, SType::Any]),
    ("or", logical, &[SType::Any, SType::Any]),
    ("not", logical, &[SType::Any, SType::Any]),
];

/// Words that read entities, components and attributes.
pub const FETCH_WORDS: &[WordDef] = &[
    ("!fil", apply_filter, &[SType::Filter]),
    ("@e", fetch_entities, &[]),
    ("@eid", fetch_entities, &[]),
    ("@c", fetch_components, &[]),
    ("@ca", fetch_attributes, &[]),
    ("pluck", pluck, &[SType::Any, SType::Any]),
    ("limit", limit, &[SType::List, SType::Value, SType::Value]),
    ("prints", prints, &[]),
];

/// Registers every row of `words` on `stack`.
pub fn load(stack: &mut QueryStack<'_>, words: &[WordDef]) {
    for (name, f, signature) in words {
        stack.add_word(name, *f, signature);
    }
}
