//! Minimal expression evaluation for subscription data.
//!
//! The full expression language lives outside this core; subscriptions
//! only need literal values and single-variable lookups, plus the error
//! taxonomy the behavior maps onto failures.

use crate::state::VariablesStore;
use crate::Key;
use bytes::Bytes;
use std::fmt;

/// An expression as attached to a catch event by the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// Literal value
    Static(Bytes),

    /// Lookup of a variable in the evaluation scope
    Variable(String),
}

/// Errors produced by expression evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// The expression itself could not be evaluated
    Evaluation { message: String },

    /// The expression evaluated, but no usable value was found
    ValueNotFound { message: String },
}

impl EvaluationError {
    pub fn message(&self) -> &str {
        match self {
            EvaluationError::Evaluation { message } => message,
            EvaluationError::ValueNotFound { message } => message,
        }
    }
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for EvaluationError {}

/// Evaluate an expression against a variable scope.
pub fn evaluate(
    expression: &Expression,
    scope_key: Key,
    variables: &VariablesStore,
) -> Result<Bytes, EvaluationError> {
    match expression {
        Expression::Static(value) => Ok(value.clone()),
        Expression::Variable(name) => {
            if name.is_empty() {
                return Err(EvaluationError::Evaluation {
                    message: "Expected a variable name but the expression is empty".to_string(),
                });
            }
            variables
                .variable(scope_key, name)
                .cloned()
                .ok_or_else(|| EvaluationError::ValueNotFound {
                    message: format!(
                        "Failed to extract value: no variable found with name '{}'",
                        name
                    ),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_expression() {
        let variables = VariablesStore::new();
        let result = evaluate(&Expression::Static(Bytes::from_static(b"order-42")), 1, &variables);
        assert_eq!(result.unwrap(), Bytes::from_static(b"order-42"));
    }

    #[test]
    fn test_variable_lookup() {
        let mut variables = VariablesStore::new();
        variables.set_variable(1, "orderId", Bytes::from_static(b"order-42"));

        let result = evaluate(&Expression::Variable("orderId".to_string()), 1, &variables);
        assert_eq!(result.unwrap(), Bytes::from_static(b"order-42"));
    }

    #[test]
    fn test_missing_variable_is_value_not_found() {
        let variables = VariablesStore::new();
        let result = evaluate(&Expression::Variable("orderId".to_string()), 1, &variables);
        assert!(matches!(
            result,
            Err(EvaluationError::ValueNotFound { .. })
        ));
    }

    #[test]
    fn test_empty_variable_name_is_evaluation_error() {
        let variables = VariablesStore::new();
        let result = evaluate(&Expression::Variable(String::new()), 1, &variables);
        assert!(matches!(result, Err(EvaluationError::Evaluation { .. })));
    }
}
