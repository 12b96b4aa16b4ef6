//! Core values, entity ids, bitfields, and errors for cairn.
//!
//! This crate provides:
//! - [`Value`] - Attribute and literal values stored in components and queries
//! - [`EntityId`] - Composite entity ids packing an entity-set id and a local id
//! - [`BitField`] - Component-def membership signatures and query masks
//! - [`Error`] - Rich error types with context
//! - FNV-1a content hashing ([`hash`]) and JSON pointer access ([`pointer`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bitfield;
pub mod entity;
pub mod error;
pub mod hash;
pub mod pointer;
pub mod value;

pub use bitfield::{BitField, MAX_COMPONENT_DEFS, MatchMode};
pub use entity::{ComponentDefId, ComponentId, EntityId};
pub use error::{Error, ErrorContext, ErrorKind};
pub use value::{Attributes, Pattern, Value};

/// Result type alias using the cairn [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
