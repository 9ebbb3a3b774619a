//! Grouped aggregation over a saturated relation
//!
//! An aggregate literal scans one relation, groups its rows by the
//! projected values of the group-by variables, and produces exactly one
//! binding per group carrying the computed aggregate. The stratifier
//! guarantees the scanned relation belongs to a strictly earlier stratum,
//! so it is already saturated and recomputing the aggregate on every pass
//! is deterministic.

use crate::binding::Binding;
use crate::database::Database;
use crate::matching::match_atom;
use deduct_ast::{Aggregate, AggregateFun, Symbol, Value};
use std::collections::HashMap;

/// Error from a structurally invalid aggregate
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateError {
    /// A group-by variable is not bound by the scanned atom
    UnboundGroupVariable { variable: Symbol },
    /// `sum` or `avg` over a non-numeric value
    NotNumeric { fun: AggregateFun, value: Value },
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateError::UnboundGroupVariable { variable } => {
                write!(
                    f,
                    "Group-by variable '{}' is not bound by the aggregated atom",
                    variable.as_ref()
                )
            }
            AggregateError::NotNumeric { fun, value } => {
                write!(
                    f,
                    "Aggregate {:?} requires numeric values, got {:?}",
                    fun, value
                )
            }
        }
    }
}

impl std::error::Error for AggregateError {}

/// Per-group accumulator
#[derive(Debug, Clone, Default)]
struct GroupAcc {
    resolved: usize,
    sum: f64,
    min: Option<Value>,
    max: Option<Value>,
    non_numeric: Option<Value>,
}

impl GroupAcc {
    fn observe(&mut self, value: Value) {
        self.resolved += 1;
        match value.as_number() {
            Some(n) => self.sum += n,
            None if self.non_numeric.is_none() => self.non_numeric = Some(value.clone()),
            None => {}
        }
        if self.min.as_ref().is_none_or(|m| value < *m) {
            self.min = Some(value.clone());
        }
        if self.max.as_ref().is_none_or(|m| value > *m) {
            self.max = Some(value);
        }
    }

    /// Finish the group; `None` means the group produces no binding
    /// (an extremum over zero resolved values has no answer).
    fn finish(&self, fun: AggregateFun) -> Result<Option<Value>, AggregateError> {
        match fun {
            AggregateFun::Count => Ok(Some(Value::Number(self.resolved as f64))),
            AggregateFun::Sum => {
                self.check_numeric(fun)?;
                Ok(Some(Value::Number(self.sum)))
            }
            AggregateFun::Avg => {
                self.check_numeric(fun)?;
                // Zero resolved contributions fall back to 0, never NaN.
                if self.resolved == 0 {
                    Ok(Some(Value::Number(0.0)))
                } else {
                    Ok(Some(Value::Number(self.sum / self.resolved as f64)))
                }
            }
            AggregateFun::Min => Ok(self.min.clone()),
            AggregateFun::Max => Ok(self.max.clone()),
        }
    }

    fn check_numeric(&self, fun: AggregateFun) -> Result<(), AggregateError> {
        match &self.non_numeric {
            Some(value) => Err(AggregateError::NotNumeric {
                fun,
                value: value.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Evaluate an aggregate literal against the database
///
/// Rows are the matches of the `over` atom against an empty binding, so
/// ground arguments in `over` act as a selection and its variables name
/// the columns. Each row contributes its resolved `value` variable, or
/// `1` when no value variable is given; rows leaving the value variable
/// unresolved contribute nothing. One output binding per group: the
/// group-by variables bound to the group key plus `into` bound to the
/// aggregate.
pub fn eval_aggregate(db: &Database, agg: &Aggregate) -> Result<Vec<Binding>, AggregateError> {
    let rows = match_atom(db, &agg.over, &Binding::new());

    let mut groups: HashMap<Vec<Value>, GroupAcc> = HashMap::new();
    for row in rows {
        let mut key = Vec::with_capacity(agg.by.len());
        for var in &agg.by {
            match row.get(var) {
                Some(value) => key.push(value.clone()),
                None => return Err(AggregateError::UnboundGroupVariable { variable: *var }),
            }
        }

        let contribution = match &agg.value {
            Some(var) => row.get(var).cloned(),
            None => Some(Value::Number(1.0)),
        };

        let acc = groups.entry(key).or_default();
        if let Some(value) = contribution {
            acc.observe(value);
        }
    }

    let mut bindings = Vec::with_capacity(groups.len());
    for (key, acc) in groups {
        let result = match acc.finish(agg.fun)? {
            Some(result) => result,
            None => continue,
        };
        let mut binding = Binding::new();
        for (var, value) in agg.by.iter().zip(key) {
            binding.bind(*var, value);
        }
        binding.bind(agg.into, result);
        bindings.push(binding);
    }

    Ok(bindings)
}
