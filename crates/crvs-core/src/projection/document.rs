//! The event document returned to callers.

use serde::{Deserialize, Serialize};

use super::error::ProjectionError;
use super::reducer::fold;
use super::state::ProjectedState;
use crate::action::{Action, EventHeader, EventId, TrackingId, TransactionId};

/// An event's identity, its complete action history and the state folded
/// from that history.
///
/// Callers may re-derive `state` locally by folding `actions`; the
/// pre-folded copy is a convenience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDocument {
    /// Event identity.
    pub id: EventId,
    /// Configured event type.
    pub event_type: String,
    /// Human-shareable tracking id.
    pub tracking_id: TrackingId,
    /// Creation time in nanoseconds since the Unix epoch.
    pub created_at_ns: u64,
    /// Complete history in append order.
    pub actions: Vec<Action>,
    /// Projection of `actions`.
    pub state: ProjectedState,
}

impl EventDocument {
    /// Folds `actions` and assembles the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the history does not fold.
    pub fn from_history(header: EventHeader, actions: Vec<Action>) -> Result<Self, ProjectionError> {
        let state = fold(&header, &actions)?;
        Ok(Self::with_state(header, actions, state))
    }

    /// Assembles a document from an already-folded state.
    #[must_use]
    pub fn with_state(header: EventHeader, actions: Vec<Action>, state: ProjectedState) -> Self {
        Self {
            id: header.id,
            event_type: header.event_type,
            tracking_id: header.tracking_id,
            created_at_ns: header.created_at_ns,
            actions,
            state,
        }
    }

    /// Returns the event header.
    #[must_use]
    pub fn header(&self) -> EventHeader {
        EventHeader {
            id: self.id,
            event_type: self.event_type.clone(),
            tracking_id: self.tracking_id.clone(),
            created_at_ns: self.created_at_ns,
        }
    }

    /// Returns the last action in the history.
    #[must_use]
    pub fn last_action(&self) -> Option<&Action> {
        self.actions.last()
    }

    /// Returns the document as it stood right after the request carrying
    /// `transaction_id` committed, including any actions chained from it.
    ///
    /// Returns `None` if no action in the history belongs to that request.
    ///
    /// # Errors
    ///
    /// Returns an error if the truncated history does not fold.
    pub fn as_of_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<Self>, ProjectionError> {
        let Some(last) = self
            .actions
            .iter()
            .rposition(|a| transaction_id.covers(&a.transaction_id))
        else {
            return Ok(None);
        };
        if last + 1 == self.actions.len() {
            return Ok(Some(self.clone()));
        }
        let actions = self.actions[..=last].to_vec();
        Self::from_history(self.header(), actions).map(Some)
    }
}
