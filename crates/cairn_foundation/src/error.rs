//! Error types for the cairn data store.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::entity::{ComponentDefId, ComponentId, EntityId};

/// The main error type for cairn operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Pushes a frame onto this error's context, creating one if needed.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        let context = self.context.take().unwrap_or_default();
        self.context = Some(context.with_frame(frame));
        self
    }

    /// Creates an entity not found error.
    #[must_use]
    pub fn entity_not_found(id: EntityId) -> Self {
        Self::new(ErrorKind::EntityNotFound {
            id,
            reason: None,
        })
    }

    /// Creates an entity not found error for an id owned by another entity set.
    #[must_use]
    pub fn foreign_entity(id: EntityId, entity_set_id: u32) -> Self {
        Self::new(ErrorKind::EntityNotFound {
            id,
            reason: Some(format!(
                "entity {} does not belong to this entityset ({entity_set_id})",
                id.local_id()
            )),
        })
    }

    /// Creates a component not found error.
    #[must_use]
    pub fn component_not_found(id: ComponentId) -> Self {
        Self::new(ErrorKind::ComponentNotFound {
            entity: None,
            component: id.to_string(),
        })
    }

    /// Creates a component not found error for an entity/def slot.
    #[must_use]
    pub fn component_slot_not_found(entity: EntityId, def: ComponentDefId) -> Self {
        Self::new(ErrorKind::ComponentNotFound {
            entity: Some(entity),
            component: format!("def {def}"),
        })
    }

    /// Creates a component def not found error.
    #[must_use]
    pub fn def_not_found(ident: impl Into<String>) -> Self {
        Self::new(ErrorKind::ComponentDefNotFound(ident.into()))
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument(message.into()))
    }

    /// Creates a query stack error raised by the word `op`.
    #[must_use]
    pub fn stack(op: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Stack {
            op: op.into(),
            message: message.into(),
        })
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        })
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Returns true if this is a not-found error of any flavour.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::EntityNotFound { .. }
                | ErrorKind::ComponentNotFound { .. }
                | ErrorKind::ComponentDefNotFound(_)
        )
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A component def identifier did not resolve.
    #[error("component def not found: {0}")]
    ComponentDefNotFound(String),

    /// Component was not found in storage.
    #[error("component not found: {component}{}", .entity.map(|e| format!(" on entity {e}")).unwrap_or_default())]
    ComponentNotFound {
        /// The owning entity, when known.
        entity: Option<EntityId>,
        /// Description of the missing component.
        component: String,
    },

    /// Entity was not found in storage.
    #[error("entity not found: {id}{}", .reason.as_ref().map(|r| format!(" ({r})")).unwrap_or_default())]
    EntityNotFound {
        /// The entity that was requested.
        id: EntityId,
        /// Additional detail about why the lookup failed.
        reason: Option<String>,
    },

    /// An argument had the wrong shape.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A query word failed.
    #[error("stack error in {op}: {message}")]
    Stack {
        /// The word that raised the error.
        op: String,
        /// Description of the failure.
        message: String,
    },

    /// A component def names a type with no registered constructor.
    #[error("could not find type {type_name} for def {uri}")]
    TypeNotFound {
        /// The unregistered type name.
        type_name: String,
        /// The def that referenced it.
        uri: String,
    },

    /// A def with the same content hash is already registered.
    #[error("def {uri} ({hash}) already exists")]
    DefExists {
        /// Uri of the existing def.
        uri: String,
        /// Content hash shared by both defs.
        hash: String,
    },

    /// Type mismatch while evaluating a query.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type.
        expected: String,
        /// The actual type encountered.
        actual: String,
    },

    /// Parse error in query text.
    #[error("parse error at {line}:{column}: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Line number (1-indexed).
        line: u32,
        /// Column number (1-indexed).
        column: u32,
    },

    /// A storage adapter rejected an operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Source text or entity set the error came from.
    pub source: Option<String>,
    /// Stack of words or operations active at the time of failure.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source description.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "at {source}")?;
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}
