//! Expression evaluation.
//!
//! The compiler never interprets expressions itself. Every binding goes
//! through an [`Evaluator`], which turns an expression string plus a
//! [`Scope`](crate::Scope) into a value or an [`EvalError`]. Reads of cells
//! performed while evaluating subscribe the running effect, which is how a
//! binding learns what it depends on.
//!
//! [`BasicEvaluator`] is the evaluator the runtime uses unless another one is
//! supplied.

mod basic;

pub use basic::BasicEvaluator;

use crate::error::EvalError;
use crate::scope::Scope;
use crate::value::Value;

/// Evaluates template expressions against a scope.
///
/// Extra bindings (the list item, `$event`) are passed by evaluating against
/// a child scope that defines them.
pub trait Evaluator {
    fn evaluate(&self, expression: &str, scope: &Scope) -> Result<Value, EvalError>;
}

impl<F> Evaluator for F
where
    F: Fn(&str, &Scope) -> Result<Value, EvalError>,
{
    fn evaluate(&self, expression: &str, scope: &Scope) -> Result<Value, EvalError> {
        self(expression, scope)
    }
}
