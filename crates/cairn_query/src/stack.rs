//! The query stack.
//!
//! Values pushed onto a [`QueryStack`] are stored as-is, except words: a
//! word the current dictionary knows is executed immediately, popping its
//! arguments and pushing its result. Unknown words are stored for a later
//! pass. Dictionary entries carry an argument signature, so one name may
//! map to several implementations selected by the types on top of the
//! stack.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cairn_foundation::{Error, Result};

use crate::source::QuerySource;
use crate::value::{SType, StackValue};

/// A native word. Receives the stack and the name it was invoked by.
pub type WordFn = fn(&mut QueryStack<'_>, &str) -> Result<Option<StackValue>>;

/// A dictionary entry.
#[derive(Clone)]
pub enum WordEntry {
    /// Native code, selected when the top of the stack matches `signature`
    /// (rightmost is the top).
    Native {
        /// The implementation.
        f: WordFn,
        /// Required types of the top items.
        signature: Vec<SType>,
    },
    /// A value pushed in place of the word.
    Constant(StackValue),
}

impl fmt::Debug for WordEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native { signature, .. } => write!(f, "Native{signature:?}"),
            Self::Constant(v) => write!(f, "Constant({v})"),
        }
    }
}

type Words = HashMap<Arc<str>, Vec<WordEntry>>;

/// A typed value stack with a word dictionary and nested scopes.
pub struct QueryStack<'a> {
    source: &'a dyn QuerySource,
    items: Vec<StackValue>,
    words: Words,
    parents: Vec<(Vec<StackValue>, Words)>,
}

impl<'a> QueryStack<'a> {
    /// Creates an empty stack reading from `source`.
    #[must_use]
    pub fn new(source: &'a dyn QuerySource) -> Self {
        Self {
            source,
            items: Vec::new(),
            words: HashMap::new(),
            parents: Vec::new(),
        }
    }

    /// Returns the source.
    #[must_use]
    pub fn source(&self) -> &'a dyn QuerySource {
        self.source
    }

    /// Returns the items, bottom first.
    #[must_use]
    pub fn items(&self) -> &[StackValue] {
        &self.items
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the top item.
    #[must_use]
    pub fn peek(&self) -> Option<&StackValue> {
        self.items.last()
    }

    /// Removes and returns the top item.
    ///
    /// # Errors
    /// Returns a stack error naming `op` if the stack is empty.
    pub fn pop(&mut self, op: &str) -> Result<StackValue> {
        self.items
            .pop()
            .ok_or_else(|| Error::stack(op, "stack underflow"))
    }

    /// Pops the top item if it has type `stype`.
    pub fn pop_if(&mut self, stype: SType) -> Option<StackValue> {
        if self.peek().is_some_and(|v| v.stype() == stype) {
            self.items.pop()
        } else {
            None
        }
    }

    /// Removes and returns every item.
    pub fn take_items(&mut self) -> Vec<StackValue> {
        std::mem::take(&mut self.items)
    }

    /// Registers a native word.
    pub fn add_word(&mut self, name: &str, f: WordFn, signature: &[SType]) {
        self.words
            .entry(Arc::from(name))
            .or_default()
            .push(WordEntry::Native {
                f,
                signature: signature.to_vec(),
            });
    }

    /// Registers a word that pushes `value`.
    pub fn define(&mut self, name: &str, value: StackValue) {
        self.words
            .entry(Arc::from(name))
            .or_default()
            .push(WordEntry::Constant(value));
    }

    /// Forgets every word.
    pub fn clear_words(&mut self) {
        self.words.clear();
    }

    /// Starts a child scope with no items and a copy of the current words.
    pub fn push_scope(&mut self) {
        let items = std::mem::take(&mut self.items);
        self.parents.push((items, self.words.clone()));
    }

    /// Ends the child scope, restoring the parent's items and words, and
    /// returns the child's items.
    pub fn pop_scope(&mut self) -> Vec<StackValue> {
        let child = std::mem::take(&mut self.items);
        if let Some((items, words)) = self.parents.pop() {
            self.items = items;
            self.words = words;
        }
        child
    }

    /// Pushes a value, executing it if it is a known word.
    ///
    /// # Errors
    /// Returns a stack error if no signature of a known word matches the
    /// stack, or whatever the word itself fails with.
    pub fn push(&mut self, value: StackValue) -> Result<()> {
        let StackValue::Word(name) = &value else {
            self.items.push(value);
            return Ok(());
        };
        match self.lookup(name)? {
            None => self.items.push(value),
            Some(WordEntry::Constant(v)) => self.items.push(v),
            Some(WordEntry::Native { f, .. }) => {
                let name = name.clone();
                if let Some(out) = f(self, &name)? {
                    self.items.push(out);
                }
            }
        }
        Ok(())
    }

    /// Pushes each value in turn.
    ///
    /// # Errors
    /// Stops at the first failing push.
    pub fn push_values(&mut self, values: impl IntoIterator<Item = StackValue>) -> Result<()> {
        values.into_iter().try_for_each(|v| self.push(v))
    }

    fn lookup(&self, name: &str) -> Result<Option<WordEntry>> {
        let Some(entries) = self.words.get(name) else {
            return Ok(None);
        };
        let found = entries.iter().rev().find(|entry| match entry {
            WordEntry::Constant(_) => true,
            WordEntry::Native { signature, .. } => self.top_matches(signature),
        });
        match found {
            Some(entry) => Ok(Some(entry.clone())),
            None => {
                let top: Vec<String> = self
                    .items
                    .iter()
                    .rev()
                    .take(2)
                    .map(|v| v.stype().to_string())
                    .collect();
                Err(Error::stack(
                    name,
                    format!("no signature matches stack top [{}]", top.join(" ")),
                ))
            }
        }
    }

    fn top_matches(&self, signature: &[SType]) -> bool {
        if signature.len() > self.items.len() {
            return false;
        }
        let top = &self.items[self.items.len() - signature.len()..];
        signature
            .iter()
            .zip(top)
            .all(|(want, have)| want.accepts(have.stype()))
    }
}

impl fmt::Display for QueryStack<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for QueryStack<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryStack")
            .field("items", &self.items)
            .field("words", &self.words.len())
            .field("depth", &self.parents.len())
            .finish_non_exhaustive()
    }
}
