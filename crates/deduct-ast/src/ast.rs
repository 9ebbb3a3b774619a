//! Core data model for the deductive engine
//!
//! This module defines the in-memory structures an evaluation run consumes.
//! Programs are built programmatically (or by an external loader); there is
//! no textual syntax at this layer.
//!
//! # Key Components
//!
//! - **Program**: facts, rules, and opaque metadata
//! - **Rule**: a head atom derived from a body of literals
//! - **Literal**: positive atom, negated atom, builtin call, or aggregate
//! - **Atom**: predicate applied to terms (e.g., `part(c, b)`)
//! - **Term**: a variable or a ground value
//! - **Value**: ground constants (symbols, strings, numbers)

use internment::Intern;
use std::collections::HashMap;

/// Interned string for efficient storage and comparison
pub type Symbol = Intern<String>;

/// Ground constant values
///
/// Values carry structural equality and hashing (floats compared by bit
/// pattern) so tuples of values can live directly in hash sets, and a total
/// order so comparison builtins and `min`/`max` are defined for every pair.
#[derive(Debug, Clone)]
pub enum Value {
    /// Number (signed, used for arithmetic and ordering)
    Number(f64),
    /// String literal
    Str(String),
    /// Opaque interned name used as a constant
    Symbol(Symbol),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Value::Number(n) => {
                0u8.hash(state);
                n.to_bits().hash(state);
            }
            Value::Str(s) => {
                1u8.hash(state);
                s.hash(state);
            }
            Value::Symbol(s) => {
                2u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl Ord for Value {
    /// Total order: numbers sort before strings, strings before symbols;
    /// within a kind, numeric order (`f64::total_cmp`) or lexicographic.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Symbol(a), Value::Symbol(b)) => a.as_ref().cmp(b.as_ref()),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Value {
    /// Shorthand for a symbol value
    pub fn sym(name: impl Into<String>) -> Self {
        Value::Symbol(Intern::new(name.into()))
    }

    /// Get the numeric content, if this value is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Value::Number(_) => 0,
            Value::Str(_) => 1,
            Value::Symbol(_) => 2,
        }
    }
}

/// A term is either a variable or a ground value
///
/// Variables whose name starts with `_` are anonymous: they match anything
/// without binding and are exempt from range restriction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// Variable, scoped to a single rule instance
    Variable(Symbol),
    /// Ground constant
    Constant(Value),
}

impl Term {
    /// Shorthand for a variable term
    pub fn var(name: impl Into<String>) -> Self {
        Term::Variable(Intern::new(name.into()))
    }

    /// Shorthand for a symbol constant term
    pub fn sym(name: impl Into<String>) -> Self {
        Term::Constant(Value::sym(name))
    }

    /// Shorthand for a number constant term
    pub fn num(n: f64) -> Self {
        Term::Constant(Value::Number(n))
    }

    /// Check if this term is a variable
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// Check if this term is ground (not a variable)
    pub fn is_ground(&self) -> bool {
        matches!(self, Term::Constant(_))
    }
}

/// An atom is a predicate applied to terms: `part(c, b)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    pub predicate: Symbol,
    pub terms: Vec<Term>,
}

impl Atom {
    /// Create a new atom with the given predicate and terms
    pub fn new(predicate: impl Into<String>, terms: Vec<Term>) -> Self {
        Atom {
            predicate: Intern::new(predicate.into()),
            terms,
        }
    }

    /// Arity of the atom (number of argument positions)
    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    /// Check if the atom contains no variables
    pub fn is_ground(&self) -> bool {
        self.terms.iter().all(|t| t.is_ground())
    }
}

/// A builtin call: an operator name plus an ordered argument list
///
/// The operator is kept as a name rather than a closed enum so that an
/// unrecognized operator is representable; evaluation treats it as a
/// literal that never holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuiltinCall {
    pub op: Symbol,
    pub args: Vec<Term>,
}

impl BuiltinCall {
    pub fn new(op: impl Into<String>, args: Vec<Term>) -> Self {
        BuiltinCall {
            op: Intern::new(op.into()),
            args,
        }
    }
}

/// Aggregation functions over a grouped relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFun {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

/// An aggregate literal: scan `over`, group rows by the `by` variables,
/// and bind `into` to the aggregate of each group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Aggregate {
    /// Atom naming the relation to scan and how its columns bind variables
    pub over: Atom,
    /// Group-by variables (the group key, in order)
    pub by: Vec<Symbol>,
    /// Optional per-row value variable; rows that leave it unresolved are skipped
    pub value: Option<Symbol>,
    /// Aggregation function applied per group
    pub fun: AggregateFun,
    /// Result variable bound to the computed aggregate
    pub into: Symbol,
}

/// A literal in a rule body
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    /// Positive atom: `part(C, Y)`
    Positive(Atom),
    /// Negated atom: holds iff the inner atom has zero matches
    Negative(Atom),
    /// Builtin call: comparison filter or arithmetic binding
    Builtin(BuiltinCall),
    /// Grouped aggregation over an earlier-stratum relation
    Aggregate(Aggregate),
}

impl Literal {
    /// Check if the literal is positive
    pub fn is_positive(&self) -> bool {
        matches!(self, Literal::Positive(_))
    }

    /// Check if the literal is negative
    pub fn is_negative(&self) -> bool {
        matches!(self, Literal::Negative(_))
    }
}

/// A rule derives its head from a body of literals
///
/// Invariant (checked before evaluation, not silently tolerated): every
/// head variable must be bound by the body — by a positive atom, an
/// aggregate's group-by/result variable, or an arithmetic result variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule {
    pub head: Atom,
    pub body: Vec<Literal>,
}

impl Rule {
    pub fn new(head: Atom, body: Vec<Literal>) -> Self {
        Rule { head, body }
    }
}

/// A program: ground facts, rules, and opaque metadata
///
/// Metadata is carried for external collaborators (loaders, translators)
/// and ignored by the evaluator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub facts: Vec<Atom>,
    pub rules: Vec<Rule>,
    pub metadata: HashMap<String, String>,
}

impl Program {
    /// Create a new empty program
    pub fn new() -> Self {
        Program::default()
    }

    /// Add a ground fact
    pub fn fact(&mut self, atom: Atom) -> &mut Self {
        self.facts.push(atom);
        self
    }

    /// Add a rule
    pub fn rule(&mut self, head: Atom, body: Vec<Literal>) -> &mut Self {
        self.rules.push(Rule::new(head, body));
        self
    }
}
