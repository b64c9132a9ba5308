//! Disallowed-pattern pass over the raw expression.
//!
//! Runs before interpolation so placeholder values can never smuggle a
//! construct past the check by assembling it at resolve time.

use once_cell::sync::Lazy;
use regex::Regex;

use trellis_protocols::error::EvaluationError;

/// Each entry pairs a pattern with the construct name reported on rejection.
static DISALLOWED: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\bfunction\b", "function definition"),
        (r"=>", "lambda definition"),
        (r"\beval\b", "dynamic evaluation"),
        (r"\bFunction\b", "dynamic evaluation"),
        (r"\bnew\s+[A-Za-z_$]", "constructor invocation"),
        (r"\brequire\b", "module loading"),
        (r"\bimport\b", "module loading"),
        (
            r"\b(?:process|global|globalThis|window|document)\b",
            "prohibited namespace",
        ),
        (r"__proto__", "prohibited namespace"),
        (r"\b(?:constructor|prototype)\b", "prohibited namespace"),
        (r"\[", "subscript indexing"),
        (r"[A-Za-z_$][A-Za-z0-9_$]*\(", "method call"),
        // Single = not part of ==, !=, <=, >= (=== is caught by its middle
        // character being preceded by =).
        (r"(?:^|[^=!<>])=(?:[^=]|$)", "assignment"),
        (r"[+\-*/%]=", "assignment"),
        (r"\+\+", "increment"),
        (r"--", "decrement"),
    ]
    .into_iter()
    .map(|(pattern, name)| {
        (
            Regex::new(pattern).unwrap_or_else(|e| panic!("bad guard pattern {pattern}: {e}")),
            name,
        )
    })
    .collect()
});

/// Reject the expression if any disallowed construct matches.
pub fn check(expression: &str) -> Result<(), EvaluationError> {
    for (pattern, construct) in DISALLOWED.iter() {
        if pattern.is_match(expression) {
            return Err(EvaluationError::Disallowed {
                construct: (*construct).to_string(),
                expression: expression.to_string(),
            });
        }
    }
    Ok(())
}
