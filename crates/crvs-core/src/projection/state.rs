//! Projected state types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::{ActionId, ActionKind, ActorId, EventId, Payload, TrackingId};

/// Lifecycle status of an event, derived from its history.
///
/// An event that does not exist yet has no status (`Option::None`); the
/// first action (`CREATE`) moves it to [`EventStatus::Draft`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// Created, not yet submitted.
    Draft,
    /// Submitted incomplete.
    Notified,
    /// Submitted complete.
    Declared,
    /// Validated by a registration agent.
    Validated,
    /// Registered. Only certificates and corrections follow.
    Registered,
    /// Sent back for re-declaration.
    Rejected,
    /// Archived. Re-activated only by `REINSTATE`.
    Archived,
    /// A correction request is awaiting review.
    CorrectionRequested,
}

impl EventStatus {
    /// Returns the canonical string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Notified => "NOTIFIED",
            Self::Declared => "DECLARED",
            Self::Validated => "VALIDATED",
            Self::Registered => "REGISTERED",
            Self::Rejected => "REJECTED",
            Self::Archived => "ARCHIVED",
            Self::CorrectionRequested => "CORRECTION_REQUESTED",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders an optional status, using `NONE` for a missing event.
#[must_use]
pub fn status_name(status: Option<EventStatus>) -> &'static str {
    status.map_or("NONE", |s| s.as_str())
}

/// The actor currently holding the exclusive mutation lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Lock holder.
    pub actor_id: ActorId,
    /// Action that granted the lock (`CREATE` or `ASSIGN`).
    pub action_id: ActionId,
    /// When the lock was granted.
    pub assigned_at_ns: u64,
}

/// A correction requested but not yet reviewed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCorrection {
    /// The `REQUEST_CORRECTION` action.
    pub request_id: ActionId,
    /// Requesting actor.
    pub requested_by: ActorId,
    /// Proposed declaration changes, merged only on approval.
    pub declaration: Payload,
}

/// Current view of an event, computed by folding its actions.
///
/// Never stored: identical histories always yield identical projections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedState {
    /// Event identity.
    pub event_id: EventId,
    /// Configured event type.
    pub event_type: String,
    /// Human-shareable tracking id.
    pub tracking_id: TrackingId,
    /// Lifecycle status.
    pub status: EventStatus,
    /// Declaration fields merged left-to-right.
    pub declaration: Payload,
    /// Current lock holder, if any.
    pub assignment: Option<Assignment>,
    /// Creation time of the event.
    pub created_at_ns: u64,
    /// Creator of the event.
    pub created_by: ActorId,
    /// Time of the last lifecycle (non-bookkeeping) action.
    pub updated_at_ns: u64,
    /// Actor of the last lifecycle (non-bookkeeping) action.
    pub updated_by: ActorId,
    /// Registration number issued on `REGISTER`.
    pub registration_number: Option<String>,
    /// Number of `PRINT_CERTIFICATE` actions.
    pub certificates_printed: u32,
    /// Correction awaiting review.
    pub pending_correction: Option<PendingCorrection>,
    /// Archived as a duplicate of another record.
    pub duplicate: bool,
    /// Reason given by the most recent `REJECT`, cleared on re-submission.
    pub rejection_reason: Option<String>,
    /// Status held before the current archive, restored by `REINSTATE`.
    pub archived_from: Option<EventStatus>,
    /// Last action in the folded history.
    pub last_action_id: ActionId,
    /// Number of actions folded.
    pub action_count: u64,
}

impl ProjectedState {
    /// Returns the current lock holder.
    #[must_use]
    pub fn assigned_to(&self) -> Option<&ActorId> {
        self.assignment.as_ref().map(|a| &a.actor_id)
    }

    /// Returns `true` if `actor` holds the lock.
    #[must_use]
    pub fn is_assigned_to(&self, actor: &ActorId) -> bool {
        self.assigned_to() == Some(actor)
    }

    /// Returns the action kinds currently legal for this event.
    #[must_use]
    pub fn legal_next_kinds(&self) -> Vec<ActionKind> {
        super::transition::legal_next_kinds(Some(self.status))
    }
}
