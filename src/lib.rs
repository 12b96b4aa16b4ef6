//! cairn - Entity-component data store
//!
//! This crate re-exports all layers of the cairn workspace for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: cairn_view: Read-only views, listeners, sinks
//! Layer 2: cairn_query: Query stack machine, filters, text parser
//! Layer 1: cairn_storage: Registry, command buffers, entity sets
//! Layer 0: cairn_foundation: Core types (Value, EntityId, BitField, Error)
//! ```

pub use cairn_foundation as foundation;
pub use cairn_query as query;
pub use cairn_storage as storage;
pub use cairn_view as view;
