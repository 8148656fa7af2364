//! Projection error types.

use thiserror::Error;

use super::transition::TransitionError;
use crate::action::{ActionId, EventId};

/// Errors raised while folding an action history.
///
/// A history accepted by the ledger always folds; these errors indicate a
/// history that was not produced through [`crate::ledger::EventLedger`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProjectionError {
    /// The history has no actions.
    #[error("event {event_id} has an empty history")]
    EmptyHistory {
        /// The event.
        event_id: EventId,
    },

    /// The first action is not `CREATE`.
    #[error("first action {action_id} of event {event_id} is not CREATE")]
    MissingCreate {
        /// The event.
        event_id: EventId,
        /// The offending first action.
        action_id: ActionId,
    },

    /// An action belongs to a different event.
    #[error("action {action_id} belongs to event {found}, not {expected}")]
    ForeignAction {
        /// The event being folded.
        expected: EventId,
        /// The event named by the action.
        found: EventId,
        /// The offending action.
        action_id: ActionId,
    },

    /// An action is illegal for the status at its position.
    #[error("illegal action {action_id} at position {position}: {source}")]
    IllegalTransition {
        /// The offending action.
        action_id: ActionId,
        /// Its position in the history.
        position: u64,
        /// Why it is illegal.
        #[source]
        source: TransitionError,
    },

    /// A correction review does not reference the pending request.
    #[error("action {action_id} does not reference the pending correction request")]
    CorrectionMismatch {
        /// The review action.
        action_id: ActionId,
        /// The request it references.
        referenced: Option<ActionId>,
        /// The request actually pending.
        pending: Option<ActionId>,
    },
}
