//! Static analysis for deductive programs
//!
//! Structural checks that run before evaluation: range restriction and
//! arity consistency ([`safety`]), and partitioning of predicates into
//! strata so negation and aggregation only look backward
//! ([`stratification`]).

pub mod safety;
pub mod stratification;

pub use safety::{check_arities, check_program, check_rule, SafetyError};
pub use stratification::{stratify, Stratification, StratificationError};
