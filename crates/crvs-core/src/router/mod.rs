//! The request handler that orchestrates every component.
//!
//! ```text
//! authorize -> payload shape -> dedupe -> load -> assignment
//!           -> transition -> validate -> append (+ chained UNASSIGN)
//! ```
//!
//! Every refusal happens before the append, so a refused request never
//! leaves a trace in the ledger. The ledger re-checks legality under its
//! write lock, and the idempotency guard turns a lost race between two
//! identical requests into a replay.

mod error;
mod request;


use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike};
use secrecy::SecretString;
use serde_json::Value;
use tracing::{Instrument, debug, field, info, info_span, warn};

pub use self::error::ActionError;
pub use self::request::ActionRequest;
use crate::action::{Action, ActionClass, ActionId, ActionKind, EventId, Payload};
use crate::assignment::{AssignmentCoordinator, AssignmentPlan};
use crate::deadline::bounded;
use crate::identity::{Identity, SCOPE_READ, ScopeChecker, required_scope};
use crate::idempotency::{IdempotencyGuard, IdempotencyKey};
use crate::ledger::EventLedger;
use crate::location::LocationResolver;
use crate::projection::{
    EventDocument, ProjectedState, REGISTRATION_NUMBER_KEY, check_transition,
};
use crate::schema::{FieldProblem, SchemaProvider};
use crate::validation::{
    ActionValidator, DEFAULT_COLLABORATOR_TIMEOUT, EVENT_TYPE_FIELD, check_declaration_allowed,
};

/// Pseudo-field for a missing or unexpected event id.
pub const EVENT_ID_FIELD: &str = "eventId";

/// Pseudo-field for a missing or mismatched correction reference.
pub const REQUEST_ID_FIELD: &str = "requestId";

/// Router limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// Limit for each schema, identity and location call.
    pub collaborator_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            collaborator_timeout: DEFAULT_COLLABORATOR_TIMEOUT,
        }
    }
}

/// Handles action requests end to end.
pub struct ActionRouter {
    ledger: Arc<EventLedger>,
    scopes: Arc<dyn ScopeChecker>,
    validator: ActionValidator,
    guard: IdempotencyGuard,
    assignment: AssignmentCoordinator,
    config: RouterConfig,
}

impl std::fmt::Debug for ActionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRouter")
            .field("ledger", &self.ledger)
            .field("validator", &self.validator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ActionRouter {
    /// Wires a router from its collaborators.
    #[must_use]
    pub fn new(
        ledger: Arc<EventLedger>,
        schemas: Arc<dyn SchemaProvider>,
        scopes: Arc<dyn ScopeChecker>,
        locations: Arc<dyn LocationResolver>,
        config: RouterConfig,
    ) -> Self {
        Self {
            guard: IdempotencyGuard::new(Arc::clone(&ledger)),
            validator: ActionValidator::new(schemas, locations)
                .with_timeout(config.collaborator_timeout),
            assignment: AssignmentCoordinator::new(),
            ledger,
            scopes,
            config,
        }
    }

    /// Returns the ledger.
    #[must_use]
    pub fn ledger(&self) -> &Arc<EventLedger> {
        &self.ledger
    }

    /// Handles one request and returns the event document as it stands
    /// right after it, including any chained actions.
    ///
    /// A retry with the same transaction id returns the original document.
    ///
    /// # Errors
    ///
    /// Returns the [`ActionError`] describing why nothing was appended.
    pub async fn handle(&self, request: ActionRequest) -> Result<EventDocument, ActionError> {
        let span = info_span!(
            "handle_action",
            kind = %request.kind,
            event_id = field::Empty,
            transaction_id = %request.transaction_id,
        );
        if let Some(event_id) = request.event_id {
            span.record("event_id", field::display(event_id));
        }
        async move {
            debug!("request received");
            let result = self.handle_inner(&request).await;
            if let Err(err) = &result {
                log_refusal(err);
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn handle_inner(&self, request: &ActionRequest) -> Result<EventDocument, ActionError> {
        let identity = self
            .authorize(&request.caller_token, &required_scope(&request.kind))
            .await?;
        check_declaration_allowed(&request.kind, &request.declaration)?;
        Self::check_request_reference(request)?;
        let key = Self::idempotency_key(request)?;

        let outcome = self
            .guard
            .dedupe(&key, &request.kind, || self.execute(request, &identity))
            .await?;
        Ok(outcome.into_document())
    }

    fn idempotency_key(request: &ActionRequest) -> Result<IdempotencyKey, ActionError> {
        let transaction_id = request.transaction_id.clone();
        match (&request.kind, request.event_id) {
            (ActionKind::Create, None) => Ok(IdempotencyKey::Create(transaction_id)),
            (ActionKind::Create, Some(_)) => Err(ActionError::validation(
                EVENT_ID_FIELD,
                FieldProblem::NotAllowed {
                    reason: "the event id is assigned by the ledger".to_string(),
                },
            )),
            (_, Some(event_id)) => Ok(IdempotencyKey::Action {
                event_id,
                transaction_id,
            }),
            (_, None) => Err(ActionError::validation(EVENT_ID_FIELD, FieldProblem::Required)),
        }
    }

    /// Only correction reviews may carry a `requestId`.
    fn check_request_reference(request: &ActionRequest) -> Result<(), ActionError> {
        if request.request_id.is_none() || is_correction_review(&request.kind) {
            return Ok(());
        }
        Err(ActionError::validation(
            REQUEST_ID_FIELD,
            FieldProblem::NotAllowed {
                reason: format!("{} does not reference a prior action", request.kind),
            },
        ))
    }

    async fn authorize(&self, token: &SecretString, scope: &str) -> Result<Identity, ActionError> {
        match bounded(
            self.config.collaborator_timeout,
            self.scopes.authorize(token, scope),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(elapsed) => {
                warn!(limit_ms = elapsed.limit.as_millis(), "scope checker timed out");
                Err(ActionError::Unavailable {
                    reason: format!(
                        "identity service: no answer within {}ms",
                        elapsed.limit.as_millis()
                    ),
                })
            },
        }
    }

    async fn execute(
        &self,
        request: &ActionRequest,
        identity: &Identity,
    ) -> Result<EventDocument, ActionError> {
        if request.kind == ActionKind::Create {
            return self.create(request, identity).await;
        }
        let Some(event_id) = request.event_id else {
            return Err(ActionError::validation(EVENT_ID_FIELD, FieldProblem::Required));
        };
        let document = self.ledger.load(event_id).await?;

        match request.kind.class() {
            ActionClass::ReadOnly => {
                check_transition(Some(document.state.status), &request.kind)?;
                let read = Self::action(event_id, request, identity)
                    .with_annotation(request.annotation.clone());
                self.append(&document, vec![read]).await
            },
            ActionClass::Assignment => {
                let plan = if request.kind == ActionKind::Assign {
                    self.assignment.plan_assign(&document.state, identity)?
                } else {
                    self.assignment.plan_unassign(&document.state, identity)?
                };
                match plan {
                    AssignmentPlan::NoOp => {
                        debug!("assignment already in requested state");
                        Ok(document)
                    },
                    AssignmentPlan::Proceed => {
                        let action = Self::action(event_id, request, identity)
                            .with_annotation(request.annotation.clone());
                        self.append(&document, vec![action]).await
                    },
                }
            },
            ActionClass::Mutating | ActionClass::Creation => {
                self.mutate(document, request, identity).await
            },
        }
    }

    async fn create(
        &self,
        request: &ActionRequest,
        identity: &Identity,
    ) -> Result<EventDocument, ActionError> {
        let Some(event_type) = request.event_type.as_deref() else {
            return Err(ActionError::validation(EVENT_TYPE_FIELD, FieldProblem::Required));
        };
        let validated = self
            .validator
            .validate(
                event_type,
                &ActionKind::Create,
                &Payload::new(),
                &request.declaration,
                &request.annotation,
            )
            .await?;

        let create = Self::action(EventId::generate(), request, identity)
            .with_declaration(validated.declaration)
            .with_annotation(validated.annotation);
        let document = self.ledger.create(event_type, create).await?;
        info!(
            event_id = %document.id,
            tracking_id = %document.tracking_id,
            "event created"
        );
        Ok(document)
    }

    async fn mutate(
        &self,
        document: EventDocument,
        request: &ActionRequest,
        identity: &Identity,
    ) -> Result<EventDocument, ActionError> {
        let state = &document.state;
        self.assignment.require_assigned_to(state, identity)?;
        check_transition(Some(state.status), &request.kind)?;

        let request_id = Self::correction_reference(state, request)?;

        let mut current = state.declaration.clone();
        if request.kind == ActionKind::ApproveCorrection {
            if let Some(pending) = &state.pending_correction {
                current.extend(pending.declaration.clone());
            }
        }

        let validated = self
            .validator
            .validate(
                &document.event_type,
                &request.kind,
                &current,
                &request.declaration,
                &request.annotation,
            )
            .await?;

        let mut action = Self::action(state.event_id, request, identity)
            .with_declaration(validated.declaration)
            .with_annotation(validated.annotation);
        if let Some(request_id) = request_id {
            action = action.with_request(request_id);
        }
        if request.kind == ActionKind::Register {
            let number = registration_number(state, action.created_at_ns);
            action
                .annotation
                .insert(REGISTRATION_NUMBER_KEY.to_string(), Value::String(number));
        }

        let mut batch = Vec::with_capacity(2);
        let follow_up = self.assignment.follow_up(&action);
        batch.push(action);
        batch.extend(follow_up);
        self.append(&document, batch).await
    }

    /// Resolves the correction request a review refers to, filling it in
    /// when the caller omitted it.
    fn correction_reference(
        state: &ProjectedState,
        request: &ActionRequest,
    ) -> Result<Option<ActionId>, ActionError> {
        if !is_correction_review(&request.kind) {
            return Ok(None);
        }

        let Some(pending) = &state.pending_correction else {
            return Err(ActionError::validation(
                REQUEST_ID_FIELD,
                FieldProblem::NotAllowed {
                    reason: "no correction request is pending".to_string(),
                },
            ));
        };
        match request.request_id {
            None => Ok(Some(pending.request_id)),
            Some(id) if id == pending.request_id => Ok(Some(id)),
            Some(_) => Err(ActionError::validation(
                REQUEST_ID_FIELD,
                FieldProblem::NotAllowed {
                    reason: format!(
                        "does not reference the pending correction request {}",
                        pending.request_id
                    ),
                },
            )),
        }
    }

    fn action(event_id: EventId, request: &ActionRequest, identity: &Identity) -> Action {
        Action::new(
            event_id,
            request.kind.clone(),
            identity.actor_id.clone(),
            request.transaction_id.clone(),
        )
    }

    async fn append(
        &self,
        document: &EventDocument,
        batch: Vec<Action>,
    ) -> Result<EventDocument, ActionError> {
        let count = batch.len();
        let updated = self.ledger.append(document, batch).await?;
        info!(
            event_id = %updated.id,
            appended = count,
            status = %updated.state.status,
            "actions appended"
        );
        Ok(updated)
    }

    /// Returns the current projected state of an event. Appends nothing.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `record.read`, `NotFound`, or
    /// `Unavailable`.
    pub async fn get_current_state(
        &self,
        event_id: EventId,
        caller_token: &SecretString,
    ) -> Result<ProjectedState, ActionError> {
        self.authorize(caller_token, SCOPE_READ).await?;
        Ok(self.ledger.state(event_id).await?)
    }
}

const fn is_correction_review(kind: &ActionKind) -> bool {
    matches!(
        kind,
        ActionKind::ApproveCorrection | ActionKind::RejectCorrection
    )
}

/// Registration number issued on `REGISTER`: the registration year followed
/// by the tracking id.
fn registration_number(state: &ProjectedState, registered_at_ns: u64) -> String {
    let year = DateTime::from_timestamp_nanos(registered_at_ns as i64).year();
    format!("{year}{}", state.tracking_id)
}

fn log_refusal(err: &ActionError) {
    match err {
        ActionError::Validation(errors) => {
            info!(errors = errors.len(), "request failed validation");
        },
        ActionError::Forbidden { .. } | ActionError::Conflict { .. } | ActionError::State { .. } => {
            warn!(code = err.code(), error = %err, "request refused");
        },
        _ => warn!(code = err.code(), error = %err, "request failed"),
    }
}
