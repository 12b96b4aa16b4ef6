//! Derived views of cairn entity sets.
//!
//! This crate provides:
//! - [`ReadOnlyView`] - Filtered membership of a source set, kept current by its events
//! - [`EntitySetListener`] - A mirror set following an origin set
//! - [`Sink`] - Applying streams of changes to a set, skipping echoes
//! - [`ViewConfig`] / [`ListenerConfig`] - Configuration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod listener;
pub mod ro_view;
pub mod sink;

pub use config::{ListenerConfig, ViewConfig};
pub use listener::EntitySetListener;
pub use ro_view::ReadOnlyView;
pub use sink::{Envelope, Sink, SinkItem, SinkReport};
