//! Bottom-up stratified evaluation for deductive programs
//!
//! Takes a [`deduct_ast::Program`] and computes its unique minimal model
//! under stratified-negation semantics.
//!
//! # Modules
//!
//! - [`binding`]: variable environments built while matching rule bodies
//! - [`database`]: the monotone store of derived relations plus the trace
//! - [`matching`]: the join/selection primitive over one atom
//! - [`builtins`]: comparison filters and arithmetic binding operators
//! - [`aggregates`]: grouped count/sum/min/max/avg over saturated relations
//! - [`evaluation`]: the per-stratum fixpoint driver
//!
//! # Example
//!
//! ```ignore
//! let mut program = Program::new();
//! program.fact(Atom::new("edge", vec![Term::sym("a"), Term::sym("b")]));
//! program.rule(
//!     Atom::new("path", vec![Term::var("X"), Term::var("Y")]),
//!     vec![Literal::Positive(Atom::new("edge", vec![Term::var("X"), Term::var("Y")]))],
//! );
//! let db = evaluate(&program)?;
//! ```

pub mod aggregates;
pub mod binding;
pub mod builtins;
pub mod database;
pub mod evaluation;
pub mod matching;

pub use aggregates::{eval_aggregate, AggregateError};
pub use binding::Binding;
pub use builtins::{eval_builtin, BuiltinError, BuiltinOp};
pub use database::{Database, InsertError, Relation, TraceEntry, Tuple};
pub use evaluation::{evaluate, evaluate_with_stats, EvaluationError, EvaluationStats};
pub use matching::match_atom;
