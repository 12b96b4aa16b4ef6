//! Component registry, command buffers, and entity sets for cairn.
//!
//! This crate provides:
//! - [`ComponentRegistry`] - Component def registration and lookup
//! - [`Component`] and [`Entity`] - Attribute bundles and their owners
//! - [`CommandBuffer`] / [`AsyncCommandBuffer`] - Batched, classified mutation
//! - [`EntitySet`] / [`AsyncEntitySet`] - Indexed entity storage with change events
//! - [`StorageAdapter`] - Row-oriented persistence contract with an in-memory adapter

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod adapter;
pub mod async_entity_set;
pub mod cmd_buffer;
pub mod component;
pub mod config;
pub mod def;
pub mod entity;
pub mod entity_set;
pub mod events;
pub mod filter;
pub mod id;
pub mod registry;

pub use adapter::{MemoryAdapter, StorageAdapter};
pub use async_entity_set::AsyncEntitySet;
pub use cmd_buffer::{
    AsyncCommandBuffer, ChangeSet, Command, CommandBuffer, CommandOptions, ComponentTarget,
};
pub use component::Component;
pub use config::EntitySetConfig;
pub use def::{ComponentDef, ComponentType, PropertyDef};
pub use entity::Entity;
pub use entity_set::EntitySet;
pub use events::{ChangeEvent, DefEvent, EventBus};
pub use filter::EntityFilter;
pub use id::{AsyncIdAllocator, ReusableIdAllocator, SharedIdAllocator};
pub use registry::{ComponentRegistry, DefIdent, RegisterOptions};
