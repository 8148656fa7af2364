//! Ledger error types.

use std::time::Duration;

use thiserror::Error;

use crate::action::{ActionId, EventId, TransactionId};
use crate::integrity::IntegrityError;
use crate::projection::{ProjectionError, TransitionError};

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error during database operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No event with this id.
    #[error("event not found: {event_id}")]
    EventNotFound {
        /// The unknown event.
        event_id: EventId,
    },

    /// Another action was appended since the caller read the history.
    #[error("conflict on event {event_id}: expected head {expected}, found {actual:?}")]
    Conflict {
        /// The contended event.
        event_id: EventId,
        /// Head the caller computed against.
        expected: ActionId,
        /// Head actually stored.
        actual: Option<ActionId>,
    },

    /// The transaction id has already been recorded.
    #[error("transaction {transaction_id} already recorded")]
    DuplicateTransaction {
        /// Event the transaction belongs to, if known.
        event_id: Option<EventId>,
        /// The reused transaction id.
        transaction_id: TransactionId,
    },

    /// A generated tracking id is already taken.
    #[error("tracking id {tracking_id} already taken")]
    TrackingIdCollision {
        /// The colliding id.
        tracking_id: String,
    },

    /// The action kind is not legal for the event's current status.
    #[error("illegal action on event {event_id}: {source}")]
    IllegalTransition {
        /// The event.
        event_id: EventId,
        /// Why it is illegal.
        #[source]
        source: TransitionError,
    },

    /// The stored or submitted history does not fold.
    #[error("projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// The hash chain does not verify.
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// A payload could not be (de)serialised.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be decoded.
    #[error("corrupt row: {details}")]
    Corrupt {
        /// What was wrong.
        details: String,
    },

    /// A storage call did not finish in time.
    #[error("storage call timed out after {limit:?}")]
    Timeout {
        /// The elapsed limit.
        limit: Duration,
    },

    /// The blocking storage task failed.
    #[error("storage task failed: {0}")]
    TaskFailed(String),
}

impl LedgerError {
    /// Lifts a projection failure raised while applying new actions, keeping
    /// illegal transitions distinct from corrupt histories.
    pub(crate) fn from_append(event_id: EventId, err: ProjectionError) -> Self {
        match err {
            ProjectionError::IllegalTransition { source, .. } => {
                Self::IllegalTransition { event_id, source }
            },
            other => Self::Projection(other),
        }
    }
}
