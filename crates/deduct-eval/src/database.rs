//! Mutable store of derived relations
//!
//! The [`Database`] maps predicate names to relations (fixed arity plus a
//! set of ground tuples). It is seeded from a program's facts and grows
//! monotonically: tuples are only ever added for the lifetime of one
//! evaluation run. A relation is created lazily on first insertion and its
//! arity is fixed by the first tuple; later inserts with a different
//! length are fatal.
//!
//! Alongside the relations the database keeps an append-only trace of
//! which rule head produced how many new tuples per productive pass. The
//! trace is diagnostic only and carries no semantic weight.

use deduct_ast::{Symbol, Value};
use std::collections::{HashMap, HashSet};

/// An ordered sequence of ground values, one derived/asserted row
pub type Tuple = Vec<Value>;

/// The tuples currently derived or asserted for one predicate name
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Relation {
    arity: usize,
    tuples: HashSet<Tuple>,
}

impl Relation {
    fn new(arity: usize) -> Self {
        Relation {
            arity,
            tuples: HashSet::new(),
        }
    }

    /// Declared arity of the relation
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Number of tuples currently stored
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    /// Check if the relation holds no tuples
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Membership test for a ground tuple
    pub fn contains(&self, tuple: &[Value]) -> bool {
        self.tuples.contains(tuple)
    }

    /// Iterate over all tuples
    pub fn tuples(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter()
    }
}

/// One productive rule firing: the head predicate and how many
/// previously-absent tuples it added in that pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub head: Symbol,
    pub new_tuples: usize,
}

/// Error inserting a tuple into the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertError {
    /// Tuple length disagrees with the relation's established arity
    ArityMismatch {
        predicate: Symbol,
        expected: usize,
        found: usize,
    },
}

impl std::fmt::Display for InsertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsertError::ArityMismatch {
                predicate,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Arity mismatch inserting into '{}': relation has arity {}, tuple has length {}",
                    predicate.as_ref(),
                    expected,
                    found
                )
            }
        }
    }
}

impl std::error::Error for InsertError {}

/// Mapping from predicate name to relation, plus the diagnostic trace
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Database {
    relations: HashMap<Symbol, Relation>,
    trace: Vec<TraceEntry>,
}

impl Database {
    /// Create an empty database
    pub fn new() -> Self {
        Database::default()
    }

    /// Insert a ground tuple, creating the relation on first use
    ///
    /// Returns `true` if the tuple was previously absent. Set semantics:
    /// re-inserting an existing tuple is a no-op returning `false`.
    pub fn insert(&mut self, predicate: Symbol, tuple: Tuple) -> Result<bool, InsertError> {
        let relation = self
            .relations
            .entry(predicate)
            .or_insert_with(|| Relation::new(tuple.len()));

        if relation.arity != tuple.len() {
            return Err(InsertError::ArityMismatch {
                predicate,
                expected: relation.arity,
                found: tuple.len(),
            });
        }

        Ok(relation.tuples.insert(tuple))
    }

    /// Get a relation by predicate name (None if nothing was ever derived)
    pub fn relation(&self, predicate: &Symbol) -> Option<&Relation> {
        self.relations.get(predicate)
    }

    /// Membership test for a ground tuple of a predicate
    pub fn contains(&self, predicate: &Symbol, tuple: &[Value]) -> bool {
        self.relations
            .get(predicate)
            .is_some_and(|r| r.contains(tuple))
    }

    /// Iterate over all predicate/relation pairs
    pub fn relations(&self) -> impl Iterator<Item = (&Symbol, &Relation)> {
        self.relations.iter()
    }

    /// Number of distinct predicates with at least one tuple
    pub fn predicate_count(&self) -> usize {
        self.relations.len()
    }

    /// Total number of tuples across all relations
    pub fn fact_count(&self) -> usize {
        self.relations.values().map(|r| r.len()).sum()
    }

    /// The diagnostic trace of productive rule firings, in order
    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub(crate) fn record(&mut self, entry: TraceEntry) {
        self.trace.push(entry);
    }
}
