//! Validation errors.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::FieldProblem;

/// A problem with one field, or with a pseudo-field such as `eventType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field id.
    pub field: String,
    /// What is wrong.
    #[serde(flatten)]
    pub problem: FieldProblem,
}

impl FieldError {
    /// Creates a field error.
    #[must_use]
    pub fn new(field: impl Into<String>, problem: FieldProblem) -> Self {
        Self {
            field: field.into(),
            problem,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// Why a payload was not accepted.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// One or more fields are invalid. Every problem found is listed.
    #[error("{} invalid field(s)", .0.len())]
    Invalid(Vec<FieldError>),

    /// A collaborator failed or did not answer in time.
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        /// `schema` or `location`.
        collaborator: &'static str,
        /// What went wrong.
        reason: String,
    },
}

impl ValidationError {
    pub(crate) fn timed_out(collaborator: &'static str, limit: Duration) -> Self {
        Self::Unavailable {
            collaborator,
            reason: format!("no answer within {}ms", limit.as_millis()),
        }
    }

    /// Returns the field errors, empty for `Unavailable`.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Invalid(errors) => errors,
            Self::Unavailable { .. } => &[],
        }
    }
}
