//! Failure values and processing errors of the behavior layer.
//!
//! Recoverable subscription failures are values: the processor publishes an
//! incident at the named scope and commits the record anyway. Structural
//! invariant violations are errors: the processor rolls back the in-memory
//! record and does not commit the position.

use crate::engine::context::BpmnElementContext;
use crate::Key;
use std::fmt;

/// Category of a recoverable failure, used when raising an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    /// Correlation-key or expression evaluation failed
    ExtractValueError,

    /// Failure without a more specific category
    Unknown,
}

/// A recoverable failure, reported as a value at the router boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    pub error_type: ErrorType,

    /// Scope at which the incident is raised
    pub variable_scope_key: Key,
}

impl Failure {
    pub fn new(message: impl Into<String>, error_type: ErrorType, variable_scope_key: Key) -> Self {
        Self {
            message: message.into(),
            error_type,
            variable_scope_key,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A structural invariant was violated while processing a record.
///
/// The enclosing stream processor rolls back and reprocesses; this error is
/// a bug indicator, not a user error.
#[derive(Debug, Clone)]
pub struct BpmnProcessingError {
    pub element_instance_key: Key,
    pub element_id: String,
    pub message: String,
}

impl BpmnProcessingError {
    pub fn new(context: &BpmnElementContext, message: impl Into<String>) -> Self {
        Self {
            element_instance_key: context.element_instance_key,
            element_id: context.record.element_id.clone(),
            message: message.into(),
        }
    }
}

impl fmt::Display for BpmnProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (element id '{}', element instance key {})",
            self.message, self.element_id, self.element_instance_key
        )
    }
}

impl std::error::Error for BpmnProcessingError {}
