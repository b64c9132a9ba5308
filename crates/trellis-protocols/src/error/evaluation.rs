//! Condition expression errors.

use thiserror::Error;

/// A condition expression was rejected or failed to evaluate.
///
/// Every variant carries the offending expression so workflow authors can
/// see exactly what was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvaluationError {
    /// The raw expression matched a disallowed construct.
    #[error("disallowed construct ({construct}) in expression: {expression}")]
    Disallowed {
        construct: String,
        expression: String,
    },

    /// A token outside the allowed literal/operator set survived
    /// interpolation.
    #[error("invalid token `{token}` in expression: {expression}")]
    InvalidToken { token: String, expression: String },

    /// The token stream did not parse as a valid expression.
    #[error("syntax error ({message}) in expression: {expression}")]
    Syntax { message: String, expression: String },
}

impl EvaluationError {
    /// The literal expression text that was rejected.
    pub fn expression(&self) -> &str {
        match self {
            EvaluationError::Disallowed { expression, .. }
            | EvaluationError::InvalidToken { expression, .. }
            | EvaluationError::Syntax { expression, .. } => expression,
        }
    }
}
