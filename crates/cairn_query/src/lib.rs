//! Query stack machine for cairn entity sets.
//!
//! A query is a postfix program: literals are pushed, words pop their
//! arguments and push results. Evaluation runs in two passes, the first
//! building masks and predicate trees, the second fetching entities,
//! components and attributes.
//!
//! This crate provides:
//! - [`Query`] - Parsed programs, usable as an [`EntityFilter`](cairn_storage::EntityFilter)
//! - [`QueryStack`] - The typed stack and word dictionary
//! - [`Filter`] - Predicate trees over component attributes
//! - [`parse`] - The query text parser
//! - [`QuerySource`] - What a query reads from

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod filter;
pub mod parser;
pub mod query;
pub mod select;
pub mod source;
pub mod stack;
pub mod value;
pub mod words;

pub use filter::{CompareOp, Filter};
pub use parser::{Parser, parse};
pub use query::Query;
pub use select::select;
pub use source::{QuerySource, SingleEntity};
pub use stack::{QueryStack, WordEntry, WordFn};
pub use value::{SType, StackValue};
