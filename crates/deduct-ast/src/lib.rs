//! Data model for the deductive query engine
//!
//! Defines the program structures the evaluator consumes (terms, atoms,
//! literals, rules, programs). See [`ast`] for the individual types.

pub mod ast;

pub use ast::{
    Aggregate, AggregateFun, Atom, BuiltinCall, Literal, Program, Rule, Symbol, Term, Value,
};
