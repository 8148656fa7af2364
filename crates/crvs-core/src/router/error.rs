//! Caller-facing error taxonomy.

use thiserror::Error;

use crate::action::{ActionKind, EventId};
use crate::assignment::AssignmentError;
use crate::identity::IdentityError;
use crate::idempotency::IdempotencyError;
use crate::ledger::LedgerError;
use crate::projection::{EventStatus, TransitionError, status_name};
use crate::schema::FieldProblem;
use crate::validation::{FieldError, ValidationError};

/// Why a request was refused.
///
/// None of these are retried internally. `Conflict` and `Unavailable` are
/// safe for the caller to retry with the same transaction id.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ActionError {
    /// The caller lacks the required scope or presented an invalid token.
    #[error("forbidden: {reason}")]
    Forbidden {
        /// Why.
        reason: String,
    },

    /// One or more fields are invalid.
    #[error("validation failed: {}", render_fields(.0))]
    Validation(Vec<FieldError>),

    /// Another actor holds the event, the event changed concurrently, or a
    /// transaction id was reused.
    #[error("conflict: {reason}")]
    Conflict {
        /// Why.
        reason: String,
    },

    /// The kind is not legal in the event's current status.
    #[error("{kind} is not legal in status {}", status_label(.status))]
    State {
        /// Current status.
        status: Option<EventStatus>,
        /// Requested kind.
        kind: ActionKind,
        /// Kinds legal instead.
        legal: Vec<ActionKind>,
    },

    /// The event does not exist.
    #[error("event {event_id} not found")]
    NotFound {
        /// The requested event.
        event_id: EventId,
    },

    /// A collaborator or storage did not answer in time.
    #[error("unavailable: {reason}")]
    Unavailable {
        /// Why.
        reason: String,
    },

    /// Storage or integrity failure.
    #[error("internal error: {reason}")]
    Internal {
        /// Why.
        reason: String,
    },
}

fn render_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[allow(clippy::ref_option)]
fn status_label(status: &Option<EventStatus>) -> &'static str {
    status_name(*status)
}

impl ActionError {
    /// Returns a stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::Validation(_) => "VALIDATION",
            Self::Conflict { .. } => "CONFLICT",
            Self::State { .. } => "STATE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Unavailable { .. } => "UNAVAILABLE",
            Self::Internal { .. } => "INTERNAL",
        }
    }

    /// Returns `true` if a retry with the same transaction id may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Unavailable { .. })
    }

    pub(crate) fn validation(field: &str, problem: FieldProblem) -> Self {
        Self::Validation(vec![FieldError::new(field, problem)])
    }
}

impl From<TransitionError> for ActionError {
    fn from(err: TransitionError) -> Self {
        Self::State {
            status: err.status,
            kind: err.kind,
            legal: err.legal,
        }
    }
}

impl From<IdentityError> for ActionError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Unavailable(reason) => Self::Unavailable { reason },
            other => Self::Forbidden {
                reason: other.to_string(),
            },
        }
    }
}

impl From<AssignmentError> for ActionError {
    fn from(err: AssignmentError) -> Self {
        if err.is_forbidden() {
            Self::Forbidden {
                reason: err.to_string(),
            }
        } else {
            Self::Conflict {
                reason: err.to_string(),
            }
        }
    }
}

impl From<ValidationError> for ActionError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Invalid(errors) => Self::Validation(errors),
            unavailable @ ValidationError::Unavailable { .. } => Self::Unavailable {
                reason: unavailable.to_string(),
            },
        }
    }
}

impl From<LedgerError> for ActionError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::EventNotFound { event_id } => Self::NotFound { event_id },
            LedgerError::IllegalTransition { source, .. } => source.into(),
            LedgerError::Conflict { .. } | LedgerError::DuplicateTransaction { .. } => {
                Self::Conflict {
                    reason: err.to_string(),
                }
            },
            LedgerError::Timeout { .. } => Self::Unavailable {
                reason: err.to_string(),
            },
            other => Self::Internal {
                reason: other.to_string(),
            },
        }
    }
}

impl From<IdempotencyError> for ActionError {
    fn from(err: IdempotencyError) -> Self {
        match err {
            IdempotencyError::Ledger(ledger) => ledger.into(),
            reused @ IdempotencyError::TransactionReused { .. } => Self::Conflict {
                reason: reused.to_string(),
            },
            other => Self::Internal {
                reason: other.to_string(),
            },
        }
    }
}
