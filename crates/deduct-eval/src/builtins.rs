//! Builtin predicate evaluation
//!
//! Builtins are evaluated directly against a binding instead of being
//! looked up in a relation. Two families are recognized:
//!
//! - **Comparisons** (`eq`, `neq`, `lt`, `le`, `gt`, `ge`): pure filters.
//!   Every argument must already be bound; ordering follows the total
//!   order on values (numeric for numbers, lexicographic for strings and
//!   symbols).
//! - **Arithmetic** (`add`, `sub`, `mul`, `div`): compute from the first
//!   two arguments (bound numbers) and bind the third argument, an
//!   unbound variable, to the result.
//!
//! An unrecognized operator name is not an error: the literal simply does
//! not hold, leaving the name space open for forward-compatible
//! extensions. Misuse of a recognized operator (unbound operands, wrong
//! argument count, non-numeric arithmetic, bound result variable) is a
//! rule-authoring defect and aborts the run. Division by zero signals a
//! domain error rather than letting an infinity or NaN leak into the
//! model.

use crate::binding::Binding;
use deduct_ast::{BuiltinCall, Symbol, Term, Value};

/// Recognized builtin operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinOp {
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

impl BuiltinOp {
    /// Look up an operator by name; `None` for unrecognized names
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "eq" => Some(BuiltinOp::Eq),
            "neq" => Some(BuiltinOp::Neq),
            "lt" => Some(BuiltinOp::Lt),
            "le" => Some(BuiltinOp::Le),
            "gt" => Some(BuiltinOp::Gt),
            "ge" => Some(BuiltinOp::Ge),
            "add" => Some(BuiltinOp::Add),
            "sub" => Some(BuiltinOp::Sub),
            "mul" => Some(BuiltinOp::Mul),
            "div" => Some(BuiltinOp::Div),
            _ => None,
        }
    }

    fn is_comparison(self) -> bool {
        matches!(
            self,
            BuiltinOp::Eq
                | BuiltinOp::Neq
                | BuiltinOp::Lt
                | BuiltinOp::Le
                | BuiltinOp::Gt
                | BuiltinOp::Ge
        )
    }
}

/// Error from misusing a recognized builtin
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinError {
    /// A comparison argument or arithmetic operand is an unbound variable
    UnboundVariable { op: Symbol, variable: Symbol },
    /// An arithmetic operand resolved to a non-number
    NotNumeric { op: Symbol, value: Value },
    /// The result position of an arithmetic builtin is not an unbound variable
    ResultNotFree { op: Symbol },
    /// Wrong number of arguments for the operator
    WrongArity {
        op: Symbol,
        expected: usize,
        found: usize,
    },
    /// `div` with a zero divisor
    DivisionByZero,
}

impl std::fmt::Display for BuiltinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuiltinError::UnboundVariable { op, variable } => {
                write!(
                    f,
                    "Unbound variable '{}' in builtin '{}'",
                    variable.as_ref(),
                    op.as_ref()
                )
            }
            BuiltinError::NotNumeric { op, value } => {
                write!(
                    f,
                    "Builtin '{}' requires numeric operands, got {:?}",
                    op.as_ref(),
                    value
                )
            }
            BuiltinError::ResultNotFree { op } => {
                write!(
                    f,
                    "Builtin '{}' must bind its result to an unbound variable",
                    op.as_ref()
                )
            }
            BuiltinError::WrongArity {
                op,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Builtin '{}' takes {} arguments, got {}",
                    op.as_ref(),
                    expected,
                    found
                )
            }
            BuiltinError::DivisionByZero => {
                write!(f, "Division by zero in builtin 'div'")
            }
        }
    }
}

impl std::error::Error for BuiltinError {}

/// Evaluate a builtin call against a binding
///
/// Returns whether the binding survives. Comparisons never mutate the
/// binding; arithmetic binds the result variable in place. Unknown
/// operators return `Ok(false)`.
pub fn eval_builtin(call: &BuiltinCall, binding: &mut Binding) -> Result<bool, BuiltinError> {
    let op = match BuiltinOp::from_name(call.op.as_ref()) {
        Some(op) => op,
        None => return Ok(false),
    };

    if op.is_comparison() {
        eval_comparison(op, call, binding)
    } else {
        eval_arithmetic(op, call, binding)
    }
}

fn eval_comparison(
    op: BuiltinOp,
    call: &BuiltinCall,
    binding: &Binding,
) -> Result<bool, BuiltinError> {
    check_arity(call, 2)?;
    let left = resolve(call, &call.args[0], binding)?;
    let right = resolve(call, &call.args[1], binding)?;

    Ok(match op {
        BuiltinOp::Eq => left == right,
        BuiltinOp::Neq => left != right,
        BuiltinOp::Lt => left < right,
        BuiltinOp::Le => left <= right,
        BuiltinOp::Gt => left > right,
        BuiltinOp::Ge => left >= right,
        _ => unreachable!("arithmetic op dispatched as comparison"),
    })
}

fn eval_arithmetic(
    op: BuiltinOp,
    call: &BuiltinCall,
    binding: &mut Binding,
) -> Result<bool, BuiltinError> {
    check_arity(call, 3)?;
    let left = resolve_number(call, &call.args[0], binding)?;
    let right = resolve_number(call, &call.args[1], binding)?;

    let result = match op {
        BuiltinOp::Add => left + right,
        BuiltinOp::Sub => left - right,
        BuiltinOp::Mul => left * right,
        BuiltinOp::Div => {
            if right == 0.0 {
                return Err(BuiltinError::DivisionByZero);
            }
            left / right
        }
        _ => unreachable!("comparison op dispatched as arithmetic"),
    };

    match &call.args[2] {
        Term::Variable(name) if !binding.contains(name) => {
            binding.bind(*name, Value::Number(result));
            Ok(true)
        }
        _ => Err(BuiltinError::ResultNotFree { op: call.op }),
    }
}

fn check_arity(call: &BuiltinCall, expected: usize) -> Result<(), BuiltinError> {
    if call.args.len() != expected {
        return Err(BuiltinError::WrongArity {
            op: call.op,
            expected,
            found: call.args.len(),
        });
    }
    Ok(())
}

fn resolve(call: &BuiltinCall, term: &Term, binding: &Binding) -> Result<Value, BuiltinError> {
    match term {
        Term::Constant(value) => Ok(value.clone()),
        Term::Variable(name) => {
            binding
                .get(name)
                .cloned()
                .ok_or(BuiltinError::UnboundVariable {
                    op: call.op,
                    variable: *name,
                })
        }
    }
}

fn resolve_number(
    call: &BuiltinCall,
    term: &Term,
    binding: &Binding,
) -> Result<f64, BuiltinError> {
    let value = resolve(call, term, binding)?;
    value.as_number().ok_or(BuiltinError::NotNumeric {
        op: call.op,
        value,
    })
}
