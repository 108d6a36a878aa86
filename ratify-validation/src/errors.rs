// Validation errors

use crate::FieldId;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Outcome of a single rule invocation, as seen by its direct caller.
pub type Settled = Result<(), RuleError>;

/// Result type for field registry operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Rejection delivered to the caller of one rule invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// The rule returned an error message and the field recorded it
    #[error("{0}")]
    Failed(String),

    /// The rule returned an error message after a newer invocation of the
    /// same rule slot had started, or after the field was reset. Field state
    /// was left untouched.
    #[error("stale result: {0}")]
    Stale(String),
}

impl RuleError {
    /// The error message produced by the rule.
    pub fn message(&self) -> &str {
        match self {
            RuleError::Failed(message) | RuleError::Stale(message) => message,
        }
    }

    /// Whether this rejection came from a superseded invocation.
    pub fn is_stale(&self) -> bool {
        matches!(self, RuleError::Stale(_))
    }
}

/// Raised by a rule that fails without producing an error message.
///
/// Only [`RuleRejection::Message`] is promoted to a validation failure.
/// A [`RuleRejection::Fault`] is logged and treated as "no error".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleRejection {
    /// Rejected with an error message, same as returning it
    #[error("{0}")]
    Message(String),

    /// Rejected with something that is not a validation message
    #[error("rule fault: {0}")]
    Fault(String),
}

impl RuleRejection {
    /// Reject with a validation message.
    pub fn message(message: impl Into<String>) -> Self {
        RuleRejection::Message(message.into())
    }

    /// Reject with an unexpected failure.
    pub fn fault(error: impl fmt::Display) -> Self {
        RuleRejection::Fault(error.to_string())
    }
}

/// Whole-form sentinel: at least one rule failed during the pass.
///
/// Carries no detail; inspect field errors for specifics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
#[error("form validation failed")]
pub struct ValidationError;

/// Outcome of a failed whole-form validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    /// One or more rules produced an error
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The form was reset while validation was in flight
    #[error("form validation cancelled by reset")]
    Cancelled,
}

impl FormError {
    /// Whether the pass was aborted by a reset.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FormError::Cancelled)
    }
}

/// Field registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A field with this id is already registered
    #[error("Field already registered: {0}")]
    DuplicateField(FieldId),

    /// No field with this id is registered
    #[error("Field not found: {0}")]
    UnknownField(FieldId),
}

/// Errors of one field, as listed in a [`ValidationReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldErrors {
    /// Field id
    pub id: FieldId,

    /// Logical field name, if any
    pub name: Option<String>,

    /// Current error messages, in rule order
    pub errors: Vec<String>,
}

/// Snapshot of every erroring field in a form
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub fields: Vec<FieldErrors>,
}

impl ValidationReport {
    /// Create a report from per-field errors, dropping fields without errors
    pub fn new(fields: Vec<FieldErrors>) -> Self {
        Self {
            fields: fields.into_iter().filter(|f| !f.errors.is_empty()).collect(),
        }
    }

    /// Check if no field has errors
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of erroring fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Get errors for a field by logical name
    pub fn get_field_errors(&self, name: &str) -> Option<&FieldErrors> {
        self.fields
            .iter()
            .find(|f| f.name.as_deref() == Some(name))
    }

    /// Convert to JSON representation
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "errors": self.fields.iter().map(|f| {
                serde_json::json!({
                    "id": f.id,
                    "name": f.name,
                    "messages": f.errors,
                })
            }).collect::<Vec<_>>()
        })
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in &self.fields {
            let label = field.name.as_deref().unwrap_or(field.id.as_str());
            writeln!(f, "{}: {}", label, field.errors.join(", "))?;
        }
        Ok(())
    }
}
