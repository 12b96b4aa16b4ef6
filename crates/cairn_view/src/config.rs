//! Configuration for views and listeners.

use cairn_storage::EntitySetConfig;

/// Configuration for a [`ReadOnlyView`](crate::ReadOnlyView).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewConfig {
    /// Queue source changes until `apply_events` instead of applying them
    /// on every sync.
    pub defer_events: bool,

    /// Publish the view's own add/remove events.
    pub emit_events: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            defer_events: false,
            emit_events: true,
        }
    }
}

impl ViewConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that batches changes until applied.
    #[must_use]
    pub fn deferred() -> Self {
        Self {
            defer_events: true,
            ..Self::default()
        }
    }

    /// Builder method to set deferral.
    #[must_use]
    pub fn with_defer_events(mut self, defer: bool) -> Self {
        self.defer_events = defer;
        self
    }

    /// Builder method to enable/disable the view's own events.
    #[must_use]
    pub fn with_emit_events(mut self, emit: bool) -> Self {
        self.emit_events = emit;
        self
    }
}

/// Configuration for an [`EntitySetListener`](crate::EntitySetListener).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Configuration of the mirror set.
    pub mirror: EntitySetConfig,

    /// Publish add/remove events on the mirror after applying changes.
    pub emit_events: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            mirror: EntitySetConfig::default(),
            emit_events: true,
        }
    }
}

impl ListenerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the mirror's configuration.
    #[must_use]
    pub fn with_mirror(mut self, mirror: EntitySetConfig) -> Self {
        self.mirror = mirror;
        self
    }

    /// Builder method to enable/disable mirror events.
    #[must_use]
    pub fn with_emit_events(mut self, emit: bool) -> Self {
        self.emit_events = emit;
        self
    }
}
