//! Safety checking for rules and programs
//!
//! Two structural checks run before any evaluation:
//!
//! 1. **Range restriction**: every variable in a rule head must be bound by
//!    the body — by a positive atom, an aggregate's group-by or result
//!    variable, or an arithmetic builtin's result variable. Unrestricted
//!    head variables would require guessing values out of thin air.
//! 2. **Arity consistency**: every use of a predicate (facts, rule heads,
//!    body atoms, aggregate sources) must agree on its arity.
//!
//! Violations are program-authoring defects and abort the run.

use deduct_ast::{Atom, Literal, Program, Rule, Symbol, Term};
use std::collections::{HashMap, HashSet};

/// Arithmetic builtins bind their third argument, so that variable counts
/// as restricted for the head.
const ARITHMETIC_OPS: [&str; 4] = ["add", "sub", "mul", "div"];

/// Error indicating a structurally invalid rule or program
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyError {
    /// Head variables not bound by any body literal
    UnrestrictedVariables {
        rule: String,
        variables: Vec<Symbol>,
    },
    /// A predicate used with two different arities
    ArityConflict {
        predicate: Symbol,
        expected: usize,
        found: usize,
    },
}

impl std::fmt::Display for SafetyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SafetyError::UnrestrictedVariables { rule, variables } => {
                write!(
                    f,
                    "Unrestricted head variables in rule '{}': {:?} are not bound by any body literal",
                    rule, variables
                )
            }
            SafetyError::ArityConflict {
                predicate,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Arity conflict for predicate '{}': used with arity {} after being established with arity {}",
                    predicate.as_ref(),
                    found,
                    expected
                )
            }
        }
    }
}

impl std::error::Error for SafetyError {}

/// Check that every head variable of a rule is bound by its body
pub fn check_rule(rule: &Rule) -> Result<(), SafetyError> {
    let mut bound_vars = HashSet::new();
    for literal in &rule.body {
        match literal {
            Literal::Positive(atom) => collect_vars_from_atom(atom, &mut bound_vars),
            Literal::Negative(_) => {
                // Negation only filters; it binds nothing.
            }
            Literal::Builtin(call) => {
                if ARITHMETIC_OPS.contains(&call.op.as_ref().as_str()) {
                    if let Some(Term::Variable(name)) = call.args.get(2) {
                        collect_var(name, &mut bound_vars);
                    }
                }
            }
            Literal::Aggregate(agg) => {
                for name in &agg.by {
                    collect_var(name, &mut bound_vars);
                }
                collect_var(&agg.into, &mut bound_vars);
            }
        }
    }

    let mut head_vars = HashSet::new();
    collect_vars_from_atom(&rule.head, &mut head_vars);

    let mut unrestricted: Vec<Symbol> = head_vars
        .iter()
        .filter(|v| !bound_vars.contains(*v))
        .cloned()
        .collect();

    if !unrestricted.is_empty() {
        unrestricted.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));
        return Err(SafetyError::UnrestrictedVariables {
            rule: rule.head.predicate.as_ref().to_string(),
            variables: unrestricted,
        });
    }

    Ok(())
}

/// Check every predicate use in the program for a consistent arity
pub fn check_arities(program: &Program) -> Result<(), SafetyError> {
    let mut arities: HashMap<Symbol, usize> = HashMap::new();

    for fact in &program.facts {
        record_arity(fact, &mut arities)?;
    }
    for rule in &program.rules {
        record_arity(&rule.head, &mut arities)?;
        for literal in &rule.body {
            match literal {
                Literal::Positive(atom) | Literal::Negative(atom) => {
                    record_arity(atom, &mut arities)?;
                }
                Literal::Builtin(_) => {
                    // Builtin operators are not relations.
                }
                Literal::Aggregate(agg) => {
                    record_arity(&agg.over, &mut arities)?;
                }
            }
        }
    }

    Ok(())
}

/// Check all rules and all predicate arities in a program
pub fn check_program(program: &Program) -> Result<(), SafetyError> {
    check_arities(program)?;
    for rule in &program.rules {
        check_rule(rule)?;
    }
    Ok(())
}

fn record_arity(atom: &Atom, arities: &mut HashMap<Symbol, usize>) -> Result<(), SafetyError> {
    let found = atom.arity();
    match arities.get(&atom.predicate) {
        Some(&expected) if expected != found => Err(SafetyError::ArityConflict {
            predicate: atom.predicate,
            expected,
            found,
        }),
        Some(_) => Ok(()),
        None => {
            arities.insert(atom.predicate, found);
            Ok(())
        }
    }
}

/// Collect all variables from an atom's terms
fn collect_vars_from_atom(atom: &Atom, vars: &mut HashSet<Symbol>) {
    for term in &atom.terms {
        if let Term::Variable(name) = term {
            collect_var(name, vars);
        }
    }
}

/// Anonymous variables (names starting with `_`) are never collected.
fn collect_var(name: &Symbol, vars: &mut HashSet<Symbol>) {
    if !name.as_ref().starts_with('_') {
        vars.insert(*name);
    }
}
