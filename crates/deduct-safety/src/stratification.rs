//! Stratification analysis for programs with negation and aggregation
//!
//! Partitions the predicates of a program into an ordered sequence of
//! strata such that a predicate never depends negatively, or through an
//! aggregate, on a predicate in its own or a later stratum. Evaluating
//! strata in order then makes negation and aggregation sound: by the time
//! a rule negates or aggregates a relation, that relation is saturated.
//!
//! # Algorithm
//!
//! 1. Build a dependency graph over predicate names with edges tagged
//!    positive, negative, or aggregated.
//! 2. Compute strongly connected components (Tarjan). A negative or
//!    aggregated edge inside one component is a cycle through
//!    negation/aggregation and the program is rejected.
//! 3. Assign each component a level over the condensation: positive edges
//!    allow the same level, negative/aggregated edges force a strictly
//!    higher level for the dependent component.
//!
//! # Example
//!
//! ```ignore
//! let stratification = stratify(&rules)?;
//! for rules_in_stratum in &stratification.rules_by_stratum {
//!     // evaluate stratum to fixpoint before moving on
//! }
//! ```

use deduct_ast::{Literal, Rule, Symbol};
use std::collections::{HashMap, HashSet};

/// Result of stratification analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stratification {
    /// Map from predicate name to stratum number (0 = bottom stratum)
    pub predicate_strata: HashMap<Symbol, usize>,
    /// Rules organized by the stratum of their head predicate
    pub rules_by_stratum: Vec<Vec<Rule>>,
    /// Total number of strata
    pub num_strata: usize,
}

impl Stratification {
    /// Stratum of a predicate; predicates never mentioned by a rule live
    /// in the bottom stratum.
    pub fn stratum_of(&self, predicate: &Symbol) -> usize {
        self.predicate_strata.get(predicate).copied().unwrap_or(0)
    }
}

/// Error during stratification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StratificationError {
    /// A negative or aggregated dependency participates in a cycle; the
    /// program has no well-defined stratified model
    CycleThroughNegation(Vec<Symbol>),
}

impl std::fmt::Display for StratificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StratificationError::CycleThroughNegation(cycle) => {
                let names: Vec<String> = cycle
                    .iter()
                    .map(|symbol| symbol.as_ref().to_string())
                    .collect();
                let mut sequence = names.clone();
                if let Some(first) = names.first() {
                    sequence.push(first.clone());
                }
                write!(
                    f,
                    "Cycle through negation/aggregation detected: {}",
                    sequence.join(" -> ")
                )
            }
        }
    }
}

impl std::error::Error for StratificationError {}

/// How one predicate depends on another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeKind {
    /// Through a positive body atom
    Positive,
    /// Through a negated body atom
    Negative,
    /// Through an aggregate's source atom
    Aggregated,
}

/// Dependency graph over predicate names
#[derive(Debug, Clone)]
struct DependencyGraph {
    edges: HashMap<Symbol, Vec<(Symbol, EdgeKind)>>,
    predicates: HashSet<Symbol>,
}

impl DependencyGraph {
    fn new() -> Self {
        DependencyGraph {
            edges: HashMap::new(),
            predicates: HashSet::new(),
        }
    }

    fn add_edge(&mut self, from: Symbol, to: Symbol, kind: EdgeKind) {
        self.predicates.insert(from);
        self.predicates.insert(to);
        self.edges.entry(from).or_default().push((to, kind));
    }

    fn dependencies(&self, pred: &Symbol) -> Vec<(Symbol, EdgeKind)> {
        self.edges.get(pred).cloned().unwrap_or_default()
    }

    /// Predicates in name order, for deterministic traversal
    fn sorted_predicates(&self) -> Vec<Symbol> {
        let mut preds: Vec<Symbol> = self.predicates.iter().copied().collect();
        preds.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));
        preds
    }
}

/// Build the dependency graph from rules (head depends on body predicates)
fn build_dependency_graph(rules: &[Rule]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();

    for rule in rules {
        let head = rule.head.predicate;
        graph.predicates.insert(head);

        for literal in &rule.body {
            match literal {
                Literal::Positive(atom) => {
                    graph.add_edge(head, atom.predicate, EdgeKind::Positive);
                }
                Literal::Negative(atom) => {
                    graph.add_edge(head, atom.predicate, EdgeKind::Negative);
                }
                Literal::Builtin(_) => {
                    // Builtins are not relations and create no dependencies.
                }
                Literal::Aggregate(agg) => {
                    graph.add_edge(head, agg.over.predicate, EdgeKind::Aggregated);
                }
            }
        }
    }

    graph
}

/// Tarjan's strongly-connected-components walk
///
/// Components are emitted in reverse topological order of the condensation:
/// every edge leaving a component points into a component emitted earlier.
struct SccWalk<'g> {
    graph: &'g DependencyGraph,
    index: HashMap<Symbol, usize>,
    lowlink: HashMap<Symbol, usize>,
    on_stack: HashSet<Symbol>,
    stack: Vec<Symbol>,
    counter: usize,
    components: Vec<Vec<Symbol>>,
}

impl<'g> SccWalk<'g> {
    fn new(graph: &'g DependencyGraph) -> Self {
        SccWalk {
            graph,
            index: HashMap::new(),
            lowlink: HashMap::new(),
            on_stack: HashSet::new(),
            stack: Vec::new(),
            counter: 0,
            components: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Vec<Symbol>> {
        for pred in self.graph.sorted_predicates() {
            if !self.index.contains_key(&pred) {
                self.connect(pred);
            }
        }
        self.components
    }

    fn connect(&mut self, v: Symbol) {
        self.index.insert(v, self.counter);
        self.lowlink.insert(v, self.counter);
        self.counter += 1;
        self.stack.push(v);
        self.on_stack.insert(v);

        for (w, _) in self.graph.dependencies(&v) {
            if !self.index.contains_key(&w) {
                self.connect(w);
                let reach = self.lowlink[&w].min(self.lowlink[&v]);
                self.lowlink.insert(v, reach);
            } else if self.on_stack.contains(&w) {
                let reach = self.index[&w].min(self.lowlink[&v]);
                self.lowlink.insert(v, reach);
            }
        }

        if self.lowlink[&v] == self.index[&v] {
            let mut component = Vec::new();
            loop {
                // The stack holds every vertex entered since v; v is the root.
                let w = match self.stack.pop() {
                    Some(w) => w,
                    None => break,
                };
                self.on_stack.remove(&w);
                component.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

/// Stratify a program's rules
///
/// Returns the predicate-to-stratum assignment and the rules bucketed by
/// head stratum, or an error naming the predicates of a component that
/// cannot be ordered (a cycle through negation or aggregation).
pub fn stratify(rules: &[Rule]) -> Result<Stratification, StratificationError> {
    if rules.is_empty() {
        return Ok(Stratification {
            predicate_strata: HashMap::new(),
            rules_by_stratum: vec![],
            num_strata: 0,
        });
    }

    let graph = build_dependency_graph(rules);
    let components = SccWalk::new(&graph).run();

    let mut component_of: HashMap<Symbol, usize> = HashMap::new();
    for (i, component) in components.iter().enumerate() {
        for pred in component {
            component_of.insert(*pred, i);
        }
    }

    // A non-positive edge staying inside one component can never point
    // strictly earlier.
    for pred in &graph.predicates {
        for (dep, kind) in graph.dependencies(pred) {
            if kind != EdgeKind::Positive && component_of[pred] == component_of[&dep] {
                let mut cycle = components[component_of[pred]].clone();
                cycle.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));
                return Err(StratificationError::CycleThroughNegation(cycle));
            }
        }
    }

    // Components arrive in reverse topological order, so every
    // cross-component dependency already has its final level.
    let mut levels = vec![0usize; components.len()];
    for (i, component) in components.iter().enumerate() {
        let mut level = 0;
        for pred in component {
            for (dep, kind) in graph.dependencies(pred) {
                let j = component_of[&dep];
                if j == i {
                    continue;
                }
                let required = match kind {
                    EdgeKind::Positive => levels[j],
                    EdgeKind::Negative | EdgeKind::Aggregated => levels[j] + 1,
                };
                level = level.max(required);
            }
        }
        levels[i] = level;
    }

    let mut predicate_strata = HashMap::new();
    for (i, component) in components.iter().enumerate() {
        for pred in component {
            predicate_strata.insert(*pred, levels[i]);
        }
    }

    let num_strata = levels.iter().max().copied().unwrap_or(0) + 1;

    let mut rules_by_stratum: Vec<Vec<Rule>> = vec![Vec::new(); num_strata];
    for rule in rules {
        let stratum = *predicate_strata.get(&rule.head.predicate).unwrap_or(&0);
        rules_by_stratum[stratum].push(rule.clone());
    }

    Ok(Stratification {
        predicate_strata,
        rules_by_stratum,
        num_strata,
    })
}
