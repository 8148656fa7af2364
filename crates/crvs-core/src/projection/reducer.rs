//! Event projection reducer.

use super::error::ProjectionError;
use super::state::{Assignment, EventStatus, PendingCorrection, ProjectedState};
use super::transition::{check_transition, target_status};
use crate::action::{Action, ActionKind, EventHeader, Payload};
use crate::reducer::{Reducer, ReducerContext, replay};

/// Annotation key carrying the number issued by `REGISTER`.
pub const REGISTRATION_NUMBER_KEY: &str = "registrationNumber";

/// Annotation key carrying the reason given by `REJECT`.
pub const REJECTION_REASON_KEY: &str = "reason";

/// Annotation key flagging an `ARCHIVE` as a duplicate.
pub const DUPLICATE_FLAG_KEY: &str = "isDuplicate";

/// Folds one event's actions into its [`ProjectedState`].
///
/// The state is `None` until `CREATE` has been applied. Each action is
/// checked against the transition table before it is applied, so a history
/// that folds is a legal history.
#[derive(Debug, Clone)]
pub struct EventProjection {
    header: EventHeader,
    state: Option<ProjectedState>,
}

impl EventProjection {
    /// Creates an empty projection for the event described by `header`.
    #[must_use]
    pub const fn new(header: EventHeader) -> Self {
        Self {
            header,
            state: None,
        }
    }

    /// Returns the event header.
    #[must_use]
    pub const fn header(&self) -> &EventHeader {
        &self.header
    }

    /// Consumes the projection, returning the folded state.
    #[must_use]
    pub fn into_state(self) -> Option<ProjectedState> {
        self.state
    }

    fn genesis(&self, action: &Action) -> ProjectedState {
        ProjectedState {
            event_id: self.header.id,
            event_type: self.header.event_type.clone(),
            tracking_id: self.header.tracking_id.clone(),
            status: EventStatus::Draft,
            declaration: action.declaration.clone(),
            assignment: Some(Assignment {
                actor_id: action.created_by.clone(),
                action_id: action.id,
                assigned_at_ns: action.created_at_ns,
            }),
            created_at_ns: self.header.created_at_ns,
            created_by: action.created_by.clone(),
            updated_at_ns: action.created_at_ns,
            updated_by: action.created_by.clone(),
            registration_number: None,
            certificates_printed: 0,
            pending_correction: None,
            duplicate: false,
            rejection_reason: None,
            archived_from: None,
            last_action_id: action.id,
            action_count: 0,
        }
    }
}

impl Reducer for EventProjection {
    type State = Option<ProjectedState>;
    type Error = ProjectionError;

    fn name(&self) -> &'static str {
        "event-projection"
    }

    fn apply(&mut self, action: &Action, ctx: &ReducerContext) -> Result<(), Self::Error> {
        if action.event_id != self.header.id {
            return Err(ProjectionError::ForeignAction {
                expected: self.header.id,
                found: action.event_id,
                action_id: action.id,
            });
        }

        let mut next = match &self.state {
            None if action.kind == ActionKind::Create => self.genesis(action),
            None => {
                return Err(ProjectionError::MissingCreate {
                    event_id: self.header.id,
                    action_id: action.id,
                });
            },
            Some(current) => {
                check_transition(Some(current.status), &action.kind).map_err(|source| {
                    ProjectionError::IllegalTransition {
                        action_id: action.id,
                        position: ctx.position,
                        source,
                    }
                })?;
                let mut next = current.clone();
                apply_action(&mut next, action)?;
                next
            },
        };

        next.last_action_id = action.id;
        next.action_count += 1;
        self.state = Some(next);
        Ok(())
    }

    fn state(&self) -> &Self::State {
        &self.state
    }

    fn state_mut(&mut self) -> &mut Self::State {
        &mut self.state
    }

    fn reset(&mut self) {
        self.state = None;
    }
}

/// Applies a non-`CREATE` action that has already passed the transition
/// check.
fn apply_action(state: &mut ProjectedState, action: &Action) -> Result<(), ProjectionError> {
    let merges = action.kind.accepts_declaration() && action.kind != ActionKind::RequestCorrection;

    match &action.kind {
        ActionKind::Assign => {
            state.assignment = Some(Assignment {
                actor_id: action.created_by.clone(),
                action_id: action.id,
                assigned_at_ns: action.created_at_ns,
            });
        },
        ActionKind::Unassign => state.assignment = None,
        ActionKind::Notify | ActionKind::Declare => state.rejection_reason = None,
        ActionKind::Register => {
            state.registration_number = annotation_str(&action.annotation, REGISTRATION_NUMBER_KEY);
        },
        ActionKind::Reject => {
            state.rejection_reason = annotation_str(&action.annotation, REJECTION_REASON_KEY);
        },
        ActionKind::Archive => {
            state.archived_from = Some(state.status);
            state.duplicate = action
                .annotation
                .get(DUPLICATE_FLAG_KEY)
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);
        },
        ActionKind::Reinstate => {
            state.status = state.archived_from.take().unwrap_or(EventStatus::Draft);
            state.duplicate = false;
        },
        ActionKind::PrintCertificate => {
            state.certificates_printed = state.certificates_printed.saturating_add(1);
        },
        ActionKind::RequestCorrection => {
            state.pending_correction = Some(PendingCorrection {
                request_id: action.id,
                requested_by: action.created_by.clone(),
                declaration: action.declaration.clone(),
            });
        },
        ActionKind::ApproveCorrection => {
            let pending = take_pending(state, action)?;
            merge(&mut state.declaration, &pending.declaration);
        },
        ActionKind::RejectCorrection => {
            take_pending(state, action)?;
        },
        ActionKind::Create
        | ActionKind::Validate
        | ActionKind::Read
        | ActionKind::Custom(_) => {},
    }

    if merges {
        merge(&mut state.declaration, &action.declaration);
    }
    if let Some(status) = target_status(&action.kind) {
        state.status = status;
    }
    if !action.kind.is_bookkeeping() {
        state.updated_at_ns = action.created_at_ns;
        state.updated_by = action.created_by.clone();
    }
    Ok(())
}

fn take_pending(
    state: &mut ProjectedState,
    action: &Action,
) -> Result<PendingCorrection, ProjectionError> {
    match state.pending_correction.take() {
        Some(pending) if action.request_id == Some(pending.request_id) => Ok(pending),
        other => Err(ProjectionError::CorrectionMismatch {
            action_id: action.id,
            referenced: action.request_id,
            pending: other.map(|p| p.request_id),
        }),
    }
}

fn merge(into: &mut Payload, from: &Payload) {
    for (key, value) in from {
        into.insert(key.clone(), value.clone());
    }
}

fn annotation_str(annotation: &Payload, key: &str) -> Option<String> {
    annotation
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
}

/// Folds a complete history from genesis.
///
/// # Errors
///
/// Returns [`ProjectionError::EmptyHistory`] for an empty slice, or the
/// first error raised while applying an action.
pub fn fold(header: &EventHeader, actions: &[Action]) -> Result<ProjectedState, ProjectionError> {
    let mut projection = EventProjection::new(header.clone());
    replay(&mut projection, actions)?;
    projection
        .into_state()
        .ok_or(ProjectionError::EmptyHistory {
            event_id: header.id,
        })
}
