//! Relational matching of an atom against the database
//!
//! The join/selection primitive of the evaluator: given a partial binding
//! and an atom, return every extension of the binding consistent with the
//! tuples currently stored for the atom's predicate.

use crate::binding::Binding;
use crate::database::Database;
use deduct_ast::{Atom, Term};

/// Match an atom against the database under a partial binding
///
/// For each stored tuple, walk the atom's argument positions left to
/// right: a ground argument must equal the tuple's value at that
/// position; a bound variable must equal its bound value; an unbound
/// variable is bound to the tuple's value. The first occurrence of a
/// variable binds it and later occurrences check equality against that
/// first binding, so repeated variables within one atom express
/// self-joins. Variables named with a leading `_` match without binding.
///
/// An absent relation yields an empty result, not an error: an
/// unevaluated predicate simply has no facts yet. One extended binding is
/// returned per surviving tuple; the database's set semantics make the
/// order irrelevant.
pub fn match_atom(db: &Database, atom: &Atom, binding: &Binding) -> Vec<Binding> {
    let relation = match db.relation(&atom.predicate) {
        Some(relation) => relation,
        None => return Vec::new(),
    };

    let mut results = Vec::new();

    'tuples: for tuple in relation.tuples() {
        if tuple.len() != atom.terms.len() {
            continue;
        }

        let mut extended = binding.clone();
        for (term, value) in atom.terms.iter().zip(tuple.iter()) {
            match term {
                Term::Constant(expected) => {
                    if expected != value {
                        continue 'tuples;
                    }
                }
                Term::Variable(name) => {
                    if name.as_ref().starts_with('_') {
                        continue;
                    }
                    match extended.get(name) {
                        Some(bound) => {
                            if bound != value {
                                continue 'tuples;
                            }
                        }
                        None => extended.bind(*name, value.clone()),
                    }
                }
            }
        }
        results.push(extended);
    }

    results
}
