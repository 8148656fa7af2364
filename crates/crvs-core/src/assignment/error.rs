//! Assignment errors.

use thiserror::Error;

use crate::action::{ActorId, EventId};

/// The caller may not act on the event under the single-writer policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AssignmentError {
    /// Nobody holds the event; the caller must `ASSIGN` first.
    #[error("event {event_id} is not assigned; assign it before acting")]
    NotAssigned {
        /// The event.
        event_id: EventId,
    },

    /// Another actor holds the event.
    #[error("event {event_id} is assigned to {holder}")]
    HeldByOther {
        /// The event.
        event_id: EventId,
        /// Current lock holder.
        holder: ActorId,
    },

    /// Releasing another actor's assignment needs an extra scope.
    #[error("unassigning {holder} from event {event_id} requires scope {scope}")]
    MissingOverride {
        /// The event.
        event_id: EventId,
        /// Current lock holder.
        holder: ActorId,
        /// The scope the caller lacks.
        scope: &'static str,
    },
}

impl AssignmentError {
    /// Returns `true` if the refusal is a missing permission rather than a
    /// lock held by someone else.
    #[must_use]
    pub const fn is_forbidden(&self) -> bool {
        matches!(self, Self::MissingOverride { .. })
    }
}
