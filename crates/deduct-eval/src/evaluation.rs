//! Bottom-up fixpoint evaluation
//!
//! The driver turns a [`Program`] into a [`Database`] holding its unique
//! minimal model under stratified-negation semantics:
//!
//! 1. Validate the program (arity consistency, range restriction).
//! 2. Stratify the rules.
//! 3. Seed the database from the ground facts.
//! 4. For each stratum in order, repeatedly apply every rule of the
//!    stratum until a full pass derives nothing new, then advance.
//!
//! Rule bodies are walked left to right with an accumulator of candidate
//! bindings: positive atoms fan bindings out through the matcher, negated
//! atoms keep bindings with zero matches, builtins filter or extend, and
//! aggregates replace the candidate set with one binding per group. Each
//! surviving binding projects the head into a ground tuple.
//!
//! Evaluation is single-threaded, synchronous, and monotone: relations
//! only grow, so re-matching against a growing relation during a
//! stratum's passes can never un-derive a tuple, and the loop terminates
//! once the finite space of derivable tuples is exhausted.

use crate::aggregates::{eval_aggregate, AggregateError};
use crate::binding::Binding;
use crate::builtins::{eval_builtin, BuiltinError};
use crate::database::{Database, InsertError, TraceEntry, Tuple};
use crate::matching::match_atom;
use deduct_ast::{Atom, Literal, Program, Rule, Symbol, Term};
use deduct_safety::{check_program, stratify, SafetyError, StratificationError};

/// Error during program evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// Range restriction or arity consistency violated
    Safety(SafetyError),
    /// Program has no stratified model
    Stratification(StratificationError),
    /// Tuple insertion failed
    Insert(InsertError),
    /// A recognized builtin was misused
    Builtin(BuiltinError),
    /// An aggregate literal was structurally invalid
    Aggregate(AggregateError),
    /// A fact contains variables
    NonGroundFact(Atom),
    /// A head variable survived to projection without a binding
    UnboundHeadVariable { rule: Symbol, variable: Symbol },
}

impl std::fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluationError::Safety(e) => write!(f, "Safety error: {}", e),
            EvaluationError::Stratification(e) => write!(f, "Stratification error: {}", e),
            EvaluationError::Insert(e) => write!(f, "Insert error: {}", e),
            EvaluationError::Builtin(e) => write!(f, "Builtin error: {}", e),
            EvaluationError::Aggregate(e) => write!(f, "Aggregate error: {}", e),
            EvaluationError::NonGroundFact(atom) => {
                write!(
                    f,
                    "Fact for predicate '{}' contains variables",
                    atom.predicate.as_ref()
                )
            }
            EvaluationError::UnboundHeadVariable { rule, variable } => {
                write!(
                    f,
                    "Head variable '{}' of rule '{}' is unbound at projection",
                    variable.as_ref(),
                    rule.as_ref()
                )
            }
        }
    }
}

impl std::error::Error for EvaluationError {}

impl From<SafetyError> for EvaluationError {
    fn from(e: SafetyError) -> Self {
        EvaluationError::Safety(e)
    }
}

impl From<StratificationError> for EvaluationError {
    fn from(e: StratificationError) -> Self {
        EvaluationError::Stratification(e)
    }
}

impl From<InsertError> for EvaluationError {
    fn from(e: InsertError) -> Self {
        EvaluationError::Insert(e)
    }
}

impl From<BuiltinError> for EvaluationError {
    fn from(e: BuiltinError) -> Self {
        EvaluationError::Builtin(e)
    }
}

impl From<AggregateError> for EvaluationError {
    fn from(e: AggregateError) -> Self {
        EvaluationError::Aggregate(e)
    }
}

/// Counters accumulated across one evaluation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvaluationStats {
    /// Full passes over the rules of some stratum
    pub passes: usize,
    /// Individual rule evaluations
    pub rule_applications: usize,
    /// Previously-absent tuples derived by rules
    pub tuples_derived: usize,
}

/// Evaluate a program to its stratified minimal model
pub fn evaluate(program: &Program) -> Result<Database, EvaluationError> {
    let (db, _) = evaluate_with_stats(program)?;
    Ok(db)
}

/// Evaluate a program, also returning derivation counters
pub fn evaluate_with_stats(
    program: &Program,
) -> Result<(Database, EvaluationStats), EvaluationError> {
    check_program(program)?;
    let stratification = stratify(&program.rules)?;

    let mut db = Database::new();
    for fact in &program.facts {
        let tuple = ground_tuple(fact)?;
        db.insert(fact.predicate, tuple)?;
    }

    let mut stats = EvaluationStats::default();
    for rules in &stratification.rules_by_stratum {
        saturate_stratum(&mut db, rules, &mut stats)?;
    }

    Ok((db, stats))
}

/// Apply the rules of one stratum until a full pass adds nothing new
fn saturate_stratum(
    db: &mut Database,
    rules: &[Rule],
    stats: &mut EvaluationStats,
) -> Result<(), EvaluationError> {
    let mut changed = true;
    while changed {
        changed = false;
        stats.passes += 1;

        for rule in rules {
            stats.rule_applications += 1;
            let bindings = satisfy_body(db, &rule.body)?;

            let mut new_tuples = 0;
            for binding in &bindings {
                let tuple = project_head(&rule.head, binding)?;
                if db.insert(rule.head.predicate, tuple)? {
                    new_tuples += 1;
                }
            }

            if new_tuples > 0 {
                db.record(TraceEntry {
                    head: rule.head.predicate,
                    new_tuples,
                });
                stats.tuples_derived += new_tuples;
                changed = true;
            }
        }
    }
    Ok(())
}

/// Thread candidate bindings through a rule body, left to right
fn satisfy_body(db: &Database, body: &[Literal]) -> Result<Vec<Binding>, EvaluationError> {
    let mut bindings = vec![Binding::new()];

    for literal in body {
        if bindings.is_empty() {
            break;
        }
        bindings = match literal {
            Literal::Positive(atom) => bindings
                .iter()
                .flat_map(|binding| match_atom(db, atom, binding))
                .collect(),
            Literal::Negative(atom) => bindings
                .into_iter()
                .filter(|binding| match_atom(db, atom, binding).is_empty())
                .collect(),
            Literal::Builtin(call) => {
                let mut kept = Vec::new();
                for mut binding in bindings {
                    if eval_builtin(call, &mut binding)? {
                        kept.push(binding);
                    }
                }
                kept
            }
            Literal::Aggregate(agg) => eval_aggregate(db, agg)?,
        };
    }

    Ok(bindings)
}

/// Project a rule head into a ground tuple under a surviving binding
///
/// Range restriction guarantees every head variable is bound by the time
/// a binding survives the body, so the error branch indicates a checker
/// gap rather than an expected runtime condition.
fn project_head(head: &Atom, binding: &Binding) -> Result<Tuple, EvaluationError> {
    head.terms
        .iter()
        .map(|term| match term {
            Term::Constant(value) => Ok(value.clone()),
            Term::Variable(name) => {
                binding
                    .get(name)
                    .cloned()
                    .ok_or(EvaluationError::UnboundHeadVariable {
                        rule: head.predicate,
                        variable: *name,
                    })
            }
        })
        .collect()
}

fn ground_tuple(fact: &Atom) -> Result<Tuple, EvaluationError> {
    fact.terms
        .iter()
        .map(|term| match term {
            Term::Constant(value) => Ok(value.clone()),
            Term::Variable(_) => Err(EvaluationError::NonGroundFact(fact.clone())),
        })
        .collect()
}

/// Total tuples recorded in the trace for one head predicate
pub fn traced_tuples(db: &Database, head: &Symbol) -> usize {
    db.trace()
        .iter()
        .filter(|entry| entry.head == *head)
        .map(|entry| entry.new_tuples)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deduct_ast::{Aggregate, AggregateFun, BuiltinCall, Value};
    use internment::Intern;

    fn sym(s: &str) -> Symbol {
        Intern::new(s.to_string())
    }

    fn atom(pred: &str, terms: Vec<Term>) -> Atom {
        Atom::new(pred, terms)
    }

    fn relation_values(db: &Database, pred: &str) -> Vec<Tuple> {
        let mut tuples: Vec<Tuple> = db
            .relation(&sym(pred))
            .map(|r| r.tuples().cloned().collect())
            .unwrap_or_default();
        tuples.sort();
        tuples
    }

    #[test]
    fn test_transitive_closure() {
        // path(X, Y) :- edge(X, Y).
        // path(X, Z) :- path(X, Y), edge(Y, Z).
        let mut program = Program::new();
        for (a, b) in [("a", "b"), ("b", "c"), ("c", "d")] {
            program.fact(atom("edge", vec![Term::sym(a), Term::sym(b)]));
        }
        program.rule(
            atom("path", vec![Term::var("X"), Term::var("Y")]),
            vec![Literal::Positive(atom(
                "edge",
                vec![Term::var("X"), Term::var("Y")],
            ))],
        );
        program.rule(
            atom("path", vec![Term::var("X"), Term::var("Z")]),
            vec![
                Literal::Positive(atom("path", vec![Term::var("X"), Term::var("Y")])),
                Literal::Positive(atom("edge", vec![Term::var("Y"), Term::var("Z")])),
            ],
        );

        let db = evaluate(&program).unwrap();
        // 3 direct edges + a->c, a->d, b->d
        assert_eq!(db.relation(&sym("path")).unwrap().len(), 6);
        assert!(db.contains(&sym("path"), &[Value::sym("a"), Value::sym("d")]));
        assert!(!db.contains(&sym("path"), &[Value::sym("d"), Value::sym("a")]));
    }

    #[test]
    fn test_negation_soundness_odd_numbers() {
        // odd(X) :- one(X), not even(X).
        let mut program = Program::new();
        for n in [1.0, 2.0, 3.0] {
            program.fact(atom("one", vec![Term::num(n)]));
        }
        program.fact(atom("even", vec![Term::num(2.0)]));
        program.rule(
            atom("odd", vec![Term::var("X")]),
            vec![
                Literal::Positive(atom("one", vec![Term::var("X")])),
                Literal::Negative(atom("even", vec![Term::var("X")])),
            ],
        );

        let db = evaluate(&program).unwrap();
        assert_eq!(
            relation_values(&db, "odd"),
            vec![vec![Value::Number(1.0)], vec![Value::Number(3.0)]]
        );
    }

    #[test]
    fn test_negation_chain_three_strata() {
        // b(X) :- base(X), not a(X).
        // c(X) :- base(X), not b(X).
        let mut program = Program::new();
        program.fact(atom("base", vec![Term::sym("n")]));
        program.fact(atom("a", vec![Term::sym("n")]));
        program.rule(
            atom("b", vec![Term::var("X")]),
            vec![
                Literal::Positive(atom("base", vec![Term::var("X")])),
                Literal::Negative(atom("a", vec![Term::var("X")])),
            ],
        );
        program.rule(
            atom("c", vec![Term::var("X")]),
            vec![
                Literal::Positive(atom("base", vec![Term::var("X")])),
                Literal::Negative(atom("b", vec![Term::var("X")])),
            ],
        );

        let db = evaluate(&program).unwrap();
        // a(n) holds, so b(n) does not, so c(n) does.
        assert!(db.relation(&sym("b")).is_none());
        assert!(db.contains(&sym("c"), &[Value::sym("n")]));
    }

    #[test]
    fn test_unstratifiable_program_is_rejected_before_evaluation() {
        // p(X) :- q(X), not p(X).
        let mut program = Program::new();
        program.fact(atom("q", vec![Term::sym("a")]));
        program.rule(
            atom("p", vec![Term::var("X")]),
            vec![
                Literal::Positive(atom("q", vec![Term::var("X")])),
                Literal::Negative(atom("p", vec![Term::var("X")])),
            ],
        );

        assert!(matches!(
            evaluate(&program),
            Err(EvaluationError::Stratification(_))
        ));
    }

    #[test]
    fn test_arity_conflict_fails_before_evaluation() {
        let mut program = Program::new();
        program.fact(atom("part", vec![Term::sym("c"), Term::sym("b")]));
        program.fact(atom("part", vec![Term::sym("c")]));

        assert!(matches!(
            evaluate(&program),
            Err(EvaluationError::Safety(SafetyError::ArityConflict { .. }))
        ));
    }

    #[test]
    fn test_non_ground_fact_is_rejected() {
        let mut program = Program::new();
        program.fact(atom("part", vec![Term::var("X")]));

        assert!(matches!(
            evaluate(&program),
            Err(EvaluationError::NonGroundFact(_))
        ));
    }

    #[test]
    fn test_unbound_comparison_variable_aborts_the_run() {
        // broken(X) :- one(X), lt(Y, X).
        let mut program = Program::new();
        program.fact(atom("one", vec![Term::num(1.0)]));
        program.rule(
            atom("broken", vec![Term::var("X")]),
            vec![
                Literal::Positive(atom("one", vec![Term::var("X")])),
                Literal::Builtin(BuiltinCall::new("lt", vec![Term::var("Y"), Term::var("X")])),
            ],
        );

        assert!(matches!(
            evaluate(&program),
            Err(EvaluationError::Builtin(BuiltinError::UnboundVariable { .. }))
        ));
    }

    #[test]
    fn test_unknown_builtin_derives_nothing_without_error() {
        let mut program = Program::new();
        program.fact(atom("one", vec![Term::num(1.0)]));
        program.rule(
            atom("out", vec![Term::var("X")]),
            vec![
                Literal::Positive(atom("one", vec![Term::var("X")])),
                Literal::Builtin(BuiltinCall::new("frobnicate", vec![Term::var("X")])),
            ],
        );

        let db = evaluate(&program).unwrap();
        assert!(db.relation(&sym("out")).is_none());
    }

    #[test]
    fn test_arithmetic_derives_computed_column() {
        // doubled(X, D) :- amount(X), mul(X, 2, D).
        let mut program = Program::new();
        program.fact(atom("amount", vec![Term::num(3.0)]));
        program.fact(atom("amount", vec![Term::num(5.0)]));
        program.rule(
            atom("doubled", vec![Term::var("X"), Term::var("D")]),
            vec![
                Literal::Positive(atom("amount", vec![Term::var("X")])),
                Literal::Builtin(BuiltinCall::new(
                    "mul",
                    vec![Term::var("X"), Term::num(2.0), Term::var("D")],
                )),
            ],
        );

        let db = evaluate(&program).unwrap();
        assert!(db.contains(&sym("doubled"), &[Value::Number(3.0), Value::Number(6.0)]));
        assert!(db.contains(&sym("doubled"), &[Value::Number(5.0), Value::Number(10.0)]));
    }

    #[test]
    fn test_aggregate_rule_sums_saturated_relation() {
        // total(G, T) :- sum of amount(G, V) grouped by G into T.
        let mut program = Program::new();
        for (g, n) in [("a", 1.0), ("a", 2.0), ("b", 5.0)] {
            program.fact(atom("amount", vec![Term::sym(g), Term::num(n)]));
        }
        program.rule(
            atom("total", vec![Term::var("G"), Term::var("T")]),
            vec![Literal::Aggregate(Aggregate {
                over: atom("amount", vec![Term::var("G"), Term::var("V")]),
                by: vec![sym("G")],
                value: Some(sym("V")),
                fun: AggregateFun::Sum,
                into: sym("T"),
            })],
        );

        let db = evaluate(&program).unwrap();
        assert_eq!(
            relation_values(&db, "total"),
            vec![
                vec![Value::sym("a"), Value::Number(3.0)],
                vec![Value::sym("b"), Value::Number(5.0)],
            ]
        );
    }

    #[test]
    fn test_aggregate_over_derived_relation() {
        // member(C, Y) :- part(C, Y).
        // size(C, N) :- count of member(C, Y) grouped by C into N.
        let mut program = Program::new();
        program.fact(atom("part", vec![Term::sym("c"), Term::sym("b")]));
        program.fact(atom("part", vec![Term::sym("c"), Term::sym("m")]));
        program.rule(
            atom("member", vec![Term::var("C"), Term::var("Y")]),
            vec![Literal::Positive(atom(
                "part",
                vec![Term::var("C"), Term::var("Y")],
            ))],
        );
        program.rule(
            atom("size", vec![Term::var("C"), Term::var("N")]),
            vec![Literal::Aggregate(Aggregate {
                over: atom("member", vec![Term::var("C"), Term::var("Y")]),
                by: vec![sym("C")],
                value: None,
                fun: AggregateFun::Count,
                into: sym("N"),
            })],
        );

        let db = evaluate(&program).unwrap();
        assert!(db.contains(&sym("size"), &[Value::sym("c"), Value::Number(2.0)]));
    }

    #[test]
    fn test_idempotence_of_saturated_model() {
        let mut program = Program::new();
        for (a, b) in [("a", "b"), ("b", "c")] {
            program.fact(atom("edge", vec![Term::sym(a), Term::sym(b)]));
        }
        program.rule(
            atom("path", vec![Term::var("X"), Term::var("Y")]),
            vec![Literal::Positive(atom(
                "edge",
                vec![Term::var("X"), Term::var("Y")],
            ))],
        );
        program.rule(
            atom("path", vec![Term::var("X"), Term::var("Z")]),
            vec![
                Literal::Positive(atom("path", vec![Term::var("X"), Term::var("Y")])),
                Literal::Positive(atom("edge", vec![Term::var("Y"), Term::var("Z")])),
            ],
        );

        let first = evaluate(&program).unwrap();

        // Re-seed a program with everything already derived; the same
        // rules must add nothing.
        let mut saturated = Program::new();
        saturated.rules = program.rules.clone();
        for (pred, relation) in first.relations() {
            for tuple in relation.tuples() {
                saturated.facts.push(Atom {
                    predicate: *pred,
                    terms: tuple.iter().map(|v| Term::Constant(v.clone())).collect(),
                });
            }
        }

        let (second, stats) = evaluate_with_stats(&saturated).unwrap();
        assert_eq!(stats.tuples_derived, 0);
        assert_eq!(second.fact_count(), first.fact_count());
    }

    #[test]
    fn test_trace_records_productive_rules_only() {
        let mut program = Program::new();
        program.fact(atom("edge", vec![Term::sym("a"), Term::sym("b")]));
        program.rule(
            atom("path", vec![Term::var("X"), Term::var("Y")]),
            vec![Literal::Positive(atom(
                "edge",
                vec![Term::var("X"), Term::var("Y")],
            ))],
        );
        program.rule(
            atom("loop", vec![Term::var("X")]),
            vec![Literal::Positive(atom(
                "edge",
                vec![Term::var("X"), Term::var("X")],
            ))],
        );

        let db = evaluate(&program).unwrap();
        assert_eq!(traced_tuples(&db, &sym("path")), 1);
        assert_eq!(traced_tuples(&db, &sym("loop")), 0);
        assert!(db.trace().iter().all(|entry| entry.new_tuples > 0));
    }

    #[test]
    fn test_stats_count_passes_and_derivations() {
        let mut program = Program::new();
        for (a, b) in [("a", "b"), ("b", "c"), ("c", "d")] {
            program.fact(atom("edge", vec![Term::sym(a), Term::sym(b)]));
        }
        program.rule(
            atom("path", vec![Term::var("X"), Term::var("Y")]),
            vec![Literal::Positive(atom(
                "edge",
                vec![Term::var("X"), Term::var("Y")],
            ))],
        );
        program.rule(
            atom("path", vec![Term::var("X"), Term::var("Z")]),
            vec![
                Literal::Positive(atom("path", vec![Term::var("X"), Term::var("Y")])),
                Literal::Positive(atom("edge", vec![Term::var("Y"), Term::var("Z")])),
            ],
        );

        let (db, stats) = evaluate_with_stats(&program).unwrap();
        assert_eq!(stats.tuples_derived, 6);
        assert_eq!(db.fact_count(), 9);
        // At least one productive pass plus the final empty pass.
        assert!(stats.passes >= 2);
        assert!(stats.rule_applications >= stats.passes);
    }

    #[test]
    fn test_repulsion_attraction_scenario() {
        // A complex c with center x and members b, m:
        //   one(X)        :- center(C, X).
        //   attracts(X,Y) :- center(C, X), part(C, Y).
        //   repels(X,Y)   :- center(C, X), part(C, Y), neq(X, Y).
        //   forSelf(X)    :- one(X), repels(X, Y).
        let mut program = Program::new();
        program.fact(atom("part", vec![Term::sym("c"), Term::sym("b")]));
        program.fact(atom("part", vec![Term::sym("c"), Term::sym("m")]));
        program.fact(atom("center", vec![Term::sym("c"), Term::sym("x")]));
        program.rule(
            atom("one", vec![Term::var("X")]),
            vec![Literal::Positive(atom(
                "center",
                vec![Term::var("C"), Term::var("X")],
            ))],
        );
        program.rule(
            atom("attracts", vec![Term::var("X"), Term::var("Y")]),
            vec![
                Literal::Positive(atom("center", vec![Term::var("C"), Term::var("X")])),
                Literal::Positive(atom("part", vec![Term::var("C"), Term::var("Y")])),
            ],
        );
        program.rule(
            atom("repels", vec![Term::var("X"), Term::var("Y")]),
            vec![
                Literal::Positive(atom("center", vec![Term::var("C"), Term::var("X")])),
                Literal::Positive(atom("part", vec![Term::var("C"), Term::var("Y")])),
                Literal::Builtin(BuiltinCall::new("neq", vec![Term::var("X"), Term::var("Y")])),
            ],
        );
        program.rule(
            atom("forSelf", vec![Term::var("X")]),
            vec![
                Literal::Positive(atom("one", vec![Term::var("X")])),
                Literal::Positive(atom("repels", vec![Term::var("X"), Term::var("Y")])),
            ],
        );

        let db = evaluate(&program).unwrap();

        assert_eq!(relation_values(&db, "one"), vec![vec![Value::sym("x")]]);
        assert_eq!(
            relation_values(&db, "attracts"),
            vec![
                vec![Value::sym("x"), Value::sym("b")],
                vec![Value::sym("x"), Value::sym("m")],
            ]
        );
        assert_eq!(
            relation_values(&db, "repels"),
            vec![
                vec![Value::sym("x"), Value::sym("b")],
                vec![Value::sym("x"), Value::sym("m")],
            ]
        );
        assert_eq!(relation_values(&db, "forSelf"), vec![vec![Value::sym("x")]]);
    }
}
