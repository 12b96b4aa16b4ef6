//! Predicate trees and their evaluation against a source.
//!
//! Comparison words build [`Filter`] nodes during the first pass of
//! [`select`](crate::select); `!fil` walks the tree over a universe of
//! entity ids in the second.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use cairn_foundation::{BitField, ComponentDefId, EntityId, Error, Result, Value};

use crate::source::QuerySource;
use crate::value::StackValue;

/// Comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
}

impl CompareOp {
    /// Parses an operator word.
    #[must_use]
    pub fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "==" => Self::Eq,
            "!=" => Self::Ne,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "<" => Self::Lt,
            "<=" => Self::Le,
            _ => return None,
        })
    }

    /// Returns the operator word.
    #[must_use]
    pub const fn word(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }

    /// The operator with its operands swapped.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            other => other,
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

/// A predicate tree node.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    /// Entities matching both sides; the right side only sees the left's
    /// results.
    And(Box<Filter>, Box<Filter>),
    /// Entities matching either side.
    Or(Box<Filter>, Box<Filter>),
    /// Entities matching the left side but not the right.
    Not(Box<Filter>, Box<Filter>),
    /// Entities whose signature matches a mask.
    Mask(BitField),
    /// Entities whose component attribute compares true against a literal.
    Compare {
        /// The operator.
        op: CompareOp,
        /// The def holding the attribute.
        def_id: ComponentDefId,
        /// JSON pointer (leading `/`) or plain attribute key.
        pointer: Arc<str>,
        /// The literal.
        value: Value,
    },
}

impl Filter {
    /// Builds a node from a word and its two operands.
    ///
    /// # Errors
    /// Returns a stack error naming `word` if the operands cannot form a
    /// node of that kind.
    pub fn build(word: &str, left: StackValue, right: StackValue) -> Result<Self> {
        if let Some(op) = CompareOp::from_word(word) {
            return Self::compare(word, op, left, right);
        }
        let left = Box::new(Self::operand(word, left)?);
        let right = Box::new(Self::operand(word, right)?);
        match word {
            "and" => Ok(Self::And(left, right)),
            "or" => Ok(Self::Or(left, right)),
            "not" => Ok(Self::Not(left, right)),
            _ => Err(Error::stack(word, "unknown filter operator")),
        }
    }

    fn operand(word: &str, value: StackValue) -> Result<Self> {
        match value {
            StackValue::Filter(f) => Ok(f),
            StackValue::BitField(bf) => Ok(Self::Mask(bf)),
            StackValue::ComponentAttr(bf, _) => Ok(Self::Mask(bf)),
            other => Err(Error::stack(
                word,
                format!("expected filter operand, got {}", other.stype()),
            )),
        }
    }

    fn compare(word: &str, op: CompareOp, left: StackValue, right: StackValue) -> Result<Self> {
        let (op, attr, literal) = match (left, right) {
            (StackValue::ComponentAttr(bf, ptr), literal) => (op, (bf, ptr), literal),
            (literal, StackValue::ComponentAttr(bf, ptr)) => (op.flipped(), (bf, ptr), literal),
            (l, r) => {
                return Err(Error::stack(
                    word,
                    format!("expected component attribute, got {} {}", l.stype(), r.stype()),
                ));
            }
        };
        let (bf, pointer) = attr;
        let def_id = bf
            .to_values()
            .first()
            .copied()
            .ok_or_else(|| Error::stack(word, "component attribute has no def"))?;
        let value = literal.to_value().ok_or_else(|| {
            Error::stack(word, format!("expected literal, got {}", literal.stype()))
        })?;
        Ok(Self::Compare {
            op,
            def_id,
            pointer,
            value,
        })
    }

    /// Returns the ids in `universe` that satisfy this filter, ascending
    /// and without duplicates.
    ///
    /// # Errors
    /// Currently infallible for in-memory sources; reserved for sources
    /// that read lazily.
    pub fn apply(&self, source: &dyn QuerySource, universe: &[EntityId]) -> Result<Vec<EntityId>> {
        let mut out = self.walk(source, universe)?;
        out.sort_unstable();
        out.dedup();
        Ok(out)
    }

    fn walk(&self, source: &dyn QuerySource, eids: &[EntityId]) -> Result<Vec<EntityId>> {
        match self {
            Self::And(left, right) => {
                let left = left.walk(source, eids)?;
                if left.is_empty() {
                    return Ok(left);
                }
                right.walk(source, &left)
            }
            Self::Or(left, right) => {
                let mut union: BTreeSet<EntityId> = left.walk(source, eids)?.into_iter().collect();
                union.extend(right.walk(source, eids)?);
                Ok(union.into_iter().collect())
            }
            Self::Not(left, right) => {
                let exclude: BTreeSet<EntityId> = right.walk(source, eids)?.into_iter().collect();
                Ok(left
                    .walk(source, eids)?
                    .into_iter()
                    .filter(|id| !exclude.contains(id))
                    .collect())
            }
            Self::Mask(mask) => Ok(eids
                .iter()
                .copied()
                .filter(|id| {
                    source
                        .entity(*id)
                        .is_some_and(|e| mask.matches(e.bit_field()))
                })
                .collect()),
            Self::Compare {
                op,
                def_id,
                pointer,
                value,
            } => Ok(eids
                .iter()
                .copied()
                .filter(|id| {
                    let attr = source
                        .entity(*id)
                        .and_then(|e| e.component(*def_id))
                        .and_then(|c| c.attribute(pointer));
                    attr.is_some_and(|attr| compare(*op, attr, value))
                })
                .collect()),
        }
    }
}

/// Compares an attribute against a literal using the literal's type:
/// list literals test membership, dates compare chronologically (attributes
/// that are not dates never match), patterns test the attribute's text, and
/// anything else uses equality or ordering.
#[must_use]
pub fn compare(op: CompareOp, attr: &Value, literal: &Value) -> bool {
    match literal {
        Value::List(items) => {
            let found = items.iter().any(|item| item.loose_eq(attr));
            match op {
                CompareOp::Eq => found,
                CompareOp::Ne => !found,
                _ => false,
            }
        }
        Value::Date(expected) => match attr.to_date() {
            Some(actual) => op.holds(actual.cmp(expected)),
            None => {
                trace!(?attr, "skipping attribute that is not a date");
                false
            }
        },
        Value::Regex(pattern) => {
            let matched = pattern.is_match(&attr.to_text());
            if op == CompareOp::Ne { !matched } else { matched }
        }
        _ => match op {
            CompareOp::Eq => attr.loose_eq(literal),
            CompareOp::Ne => !attr.loose_eq(literal),
            _ => attr
                .partial_cmp(literal)
                .is_some_and(|ordering| op.holds(ordering)),
        },
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(l, r) => write!(f, "({l} {r} and)"),
            Self::Or(l, r) => write!(f, "({l} {r} or)"),
            Self::Not(l, r) => write!(f, "({l} {r} not)"),
            Self::Mask(bf) => write!(f, "{bf:?}"),
            Self::Compare {
                op,
                def_id,
                pointer,
                value,
            } => write!(f, "({def_id}#{pointer} {value:?} {})", op.word()),
        }
    }
}
