//! Sandboxed condition-expression evaluation.
//!
//! Guard expressions gate a step's success edge. The pipeline is:
//!
//! 1. [`guard`] rejects the raw expression if it contains any construct
//!    outside the comparison grammar (function syntax, module loading,
//!    subscripts, assignment, ...).
//! 2. [`interpolate`] resolves `{{dotted.path}}` placeholders against the
//!    run context, rendering values as literals.
//! 3. [`lexer`] tokenizes the interpolated text; anything that is not a
//!    literal, an allowed operator or parens fails; bare identifiers never
//!    survive.
//! 4. [`parser`] builds an AST by recursive descent and evaluates it
//!    directly. There is no dynamic code construction anywhere in the
//!    pipeline, so an expression can never read or mutate anything beyond
//!    its own literals.
//!
//! Comparison semantics: `===`/`!==` are strict (same type only); `==`/`!=`
//! coerce number↔string and booleans to numbers, and `null` loose-equals
//! only `null`. Logical operators use truthiness (false, 0, "" and null are
//! falsy). The final result is the truthiness of the evaluated value.

mod builders;
mod guard;
mod interpolate;
mod lexer;
mod parser;

#[cfg(test)]
#[path = "evaluator_tests.rs"]
mod tests;

pub use builders::{
    step_failed, step_succeeded, variable_contains, variable_equals, variable_greater_than,
};

use trellis_protocols::error::EvaluationError;
use trellis_protocols::types::RunContext;

/// Evaluate a guard expression against the run context.
///
/// Fails with [`EvaluationError`] (carrying the offending expression) on
/// any disallowed construct, invalid token or syntax error. The execution
/// engine treats that as a step-level failure, never a crash.
pub fn evaluate(expression: &str, context: &RunContext) -> Result<bool, EvaluationError> {
    guard::check(expression)?;
    let interpolated = interpolate::render(expression, context);
    let tokens = lexer::tokenize(&interpolated, expression)?;
    let expr = parser::parse(&tokens, expression)?;
    Ok(expr.eval().truthy())
}
