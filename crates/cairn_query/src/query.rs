//! Parsed query programs.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use cairn_foundation::{EntityId, Result, hash};
use cairn_storage::{ComponentRegistry, Entity, EntityFilter};

use crate::parser;
use crate::select::select;
use crate::source::{QuerySource, SingleEntity};
use crate::stack::QueryStack;
use crate::value::StackValue;

/// A query program, ready to run against any [`QuerySource`].
#[derive(Clone, PartialEq)]
pub struct Query {
    text: Arc<str>,
    program: Vec<StackValue>,
    hash: u32,
}

impl Query {
    /// Parses query text.
    ///
    /// # Errors
    /// Returns `ParseError` on malformed text.
    pub fn parse(text: &str) -> Result<Self> {
        let program = parser::parse(text)?;
        Ok(Self {
            text: Arc::from(text),
            program,
            hash: hash::hash_str(text),
        })
    }

    /// Wraps an instruction list.
    #[must_use]
    pub fn new(program: Vec<StackValue>) -> Self {
        let text = program
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            hash: hash::hash_str(&text),
            text: Arc::from(text),
            program,
        }
    }

    /// Returns the instruction list.
    #[must_use]
    pub fn program(&self) -> &[StackValue] {
        &self.program
    }

    /// Returns the source text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// FNV-1a hash of the text.
    #[must_use]
    pub const fn hash(&self) -> u32 {
        self.hash
    }

    /// Runs the program and returns the resulting stack items.
    ///
    /// # Errors
    /// Returns the first word error; partial results are discarded.
    pub fn execute(&self, source: &dyn QuerySource) -> Result<Vec<StackValue>> {
        let mut stack = QueryStack::new(source);
        let out = select(&mut stack, &self.program)?;
        trace!(query = %self.text, items = out.len(), "query executed");
        Ok(out)
    }

    /// Runs the program and collects the entity ids it denotes: entities,
    /// components' owners and integer ids, searched one list level deep.
    ///
    /// # Errors
    /// See [`Query::execute`].
    pub fn entity_ids(&self, source: &dyn QuerySource) -> Result<Vec<EntityId>> {
        let mut ids: Vec<EntityId> = self
            .execute(source)?
            .iter()
            .flat_map(|item| match item {
                StackValue::List(items) => items.iter().filter_map(StackValue::entity_id).collect(),
                other => other.entity_id().into_iter().collect::<Vec<_>>(),
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Query({:?} #{})", self.text, hash::hash_to_string(self.hash))
    }
}

impl EntityFilter for Query {
    /// Accepts the entity if the program, run against it alone, leaves a
    /// non-empty result.
    fn accepts(&self, registry: &ComponentRegistry, entity: &Entity) -> Result<bool> {
        let single = SingleEntity::new(registry, entity);
        Ok(self
            .execute(&single)?
            .iter()
            .any(StackValue::is_non_empty))
    }

    fn hash(&self) -> u32 {
        self.hash
    }
}
