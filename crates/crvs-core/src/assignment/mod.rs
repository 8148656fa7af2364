//! Single-writer assignment policy.
//!
//! At most one actor holds an event at a time. Mutating actions require the
//! caller to hold it; `CREATE` grants it to the creator, `ASSIGN` takes it,
//! `UNASSIGN` releases it. `REGISTER` and `PRINT_CERTIFICATE` release it
//! automatically: the router appends a chained `UNASSIGN` in the same batch.
//!
//! The coordinator only decides. The assignment itself lives in the action
//! history, so the ledger's optimistic append is what makes two concurrent
//! `ASSIGN`s resolve to a single winner.

mod error;


pub use self::error::AssignmentError;
use crate::action::{Action, ActionKind};
use crate::identity::{Identity, SCOPE_UNASSIGN_OTHERS};
use crate::projection::ProjectedState;

/// Suffix of the transaction id used for the automatic `UNASSIGN`.
pub const AUTO_UNASSIGN_SUFFIX: &str = "unassign";

/// What to do with an `ASSIGN` or `UNASSIGN` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentPlan {
    /// Append the action.
    Proceed,
    /// Already in the requested state; append nothing.
    NoOp,
}

/// Applies the assignment policy to projected state.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignmentCoordinator;

impl AssignmentCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Checks that `identity` holds the event.
    ///
    /// # Errors
    ///
    /// Returns `NotAssigned` or `HeldByOther`.
    pub fn require_assigned_to(
        &self,
        state: &ProjectedState,
        identity: &Identity,
    ) -> Result<(), AssignmentError> {
        match state.assigned_to() {
            Some(holder) if *holder == identity.actor_id => Ok(()),
            Some(holder) => Err(AssignmentError::HeldByOther {
                event_id: state.event_id,
                holder: holder.clone(),
            }),
            None => Err(AssignmentError::NotAssigned {
                event_id: state.event_id,
            }),
        }
    }

    /// Decides an `ASSIGN` by `identity`.
    ///
    /// # Errors
    ///
    /// Returns `HeldByOther` if someone else holds the event.
    pub fn plan_assign(
        &self,
        state: &ProjectedState,
        identity: &Identity,
    ) -> Result<AssignmentPlan, AssignmentError> {
        match state.assigned_to() {
            None => Ok(AssignmentPlan::Proceed),
            Some(holder) if *holder == identity.actor_id => Ok(AssignmentPlan::NoOp),
            Some(holder) => Err(AssignmentError::HeldByOther {
                event_id: state.event_id,
                holder: holder.clone(),
            }),
        }
    }

    /// Decides an `UNASSIGN` by `identity`.
    ///
    /// # Errors
    ///
    /// Returns `MissingOverride` if another actor holds the event and the
    /// caller lacks `record.unassign-others`.
    pub fn plan_unassign(
        &self,
        state: &ProjectedState,
        identity: &Identity,
    ) -> Result<AssignmentPlan, AssignmentError> {
        match state.assigned_to() {
            None => Ok(AssignmentPlan::NoOp),
            Some(holder) if *holder == identity.actor_id => Ok(AssignmentPlan::Proceed),
            Some(_) if identity.has_scope(SCOPE_UNASSIGN_OTHERS) => Ok(AssignmentPlan::Proceed),
            Some(holder) => Err(AssignmentError::MissingOverride {
                event_id: state.event_id,
                holder: holder.clone(),
                scope: SCOPE_UNASSIGN_OTHERS,
            }),
        }
    }

    /// Returns the automatic action that follows `trigger`, if any.
    ///
    /// The follow-up shares the trigger's actor and timestamp; its
    /// transaction id is chained from the trigger's so a retry of the
    /// original request finds both.
    #[must_use]
    pub fn follow_up(&self, trigger: &Action) -> Option<Action> {
        if !trigger.kind.auto_unassigns() {
            return None;
        }
        Some(Action::with_timestamp(
            trigger.event_id,
            ActionKind::Unassign,
            trigger.created_by.clone(),
            trigger.transaction_id.chained(AUTO_UNASSIGN_SUFFIX),
            trigger.created_at_ns,
        ))
    }
}
