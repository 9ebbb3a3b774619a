//! Variable bindings built up while matching a rule body
//!
//! A [`Binding`] maps variable names to ground values. One is created
//! fresh per partial match of a rule body, extended literal by literal,
//! and consumed when the rule head is projected into a tuple. Bindings
//! are never shared across rule instances.

use deduct_ast::{Symbol, Term, Value};
use std::collections::HashMap;

/// A partial assignment of ground values to variables
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Binding {
    bindings: HashMap<Symbol, Value>,
}

impl Binding {
    /// Create an empty binding
    pub fn new() -> Self {
        Binding {
            bindings: HashMap::new(),
        }
    }

    /// Bind a variable to a value, replacing any previous binding
    pub fn bind(&mut self, var: Symbol, value: Value) {
        self.bindings.insert(var, value);
    }

    /// Get the value bound to a variable
    pub fn get(&self, var: &Symbol) -> Option<&Value> {
        self.bindings.get(var)
    }

    /// Check if a variable is bound
    pub fn contains(&self, var: &Symbol) -> bool {
        self.bindings.contains_key(var)
    }

    /// Resolve a term to a ground value under this binding
    pub fn resolve(&self, term: &Term) -> Option<Value> {
        match term {
            Term::Constant(value) => Some(value.clone()),
            Term::Variable(name) => self.bindings.get(name).cloned(),
        }
    }

    /// Number of bound variables
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if no variables are bound
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterate over all variable/value pairs
    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Value)> {
        self.bindings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use internment::Intern;

    fn sym(s: &str) -> Symbol {
        Intern::new(s.to_string())
    }

    #[test]
    fn test_bind_and_get() {
        let mut binding = Binding::new();
        assert!(binding.is_empty());

        binding.bind(sym("X"), Value::sym("a"));
        assert_eq!(binding.get(&sym("X")), Some(&Value::sym("a")));
        assert_eq!(binding.get(&sym("Y")), None);
        assert_eq!(binding.len(), 1);
    }

    #[test]
    fn test_resolve_constant_and_variable() {
        let mut binding = Binding::new();
        binding.bind(sym("X"), Value::Number(3.0));

        assert_eq!(binding.resolve(&Term::num(7.0)), Some(Value::Number(7.0)));
        assert_eq!(binding.resolve(&Term::var("X")), Some(Value::Number(3.0)));
        assert_eq!(binding.resolve(&Term::var("Y")), None);
    }
}
