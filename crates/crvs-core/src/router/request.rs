//! Incoming action requests.

use secrecy::SecretString;

use crate::action::{ActionId, ActionKind, EventId, Payload, TransactionId};

/// One client request to record an action.
///
/// `event_id` is absent for `CREATE` and required otherwise; `event_type`
/// is required for `CREATE` only.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    /// Requested kind.
    pub kind: ActionKind,
    /// Target event.
    pub event_id: Option<EventId>,
    /// Event type for `CREATE`.
    pub event_type: Option<String>,
    /// Client idempotency key.
    pub transaction_id: TransactionId,
    /// Opaque caller credential.
    pub caller_token: SecretString,
    /// Declaration fields.
    pub declaration: Payload,
    /// Action-scoped fields.
    pub annotation: Payload,
    /// Referenced correction request, for correction reviews.
    pub request_id: Option<ActionId>,
}

impl ActionRequest {
    /// A `CREATE` request for a new event of `event_type`.
    #[must_use]
    pub fn create(
        event_type: impl Into<String>,
        caller_token: impl Into<SecretString>,
        transaction_id: TransactionId,
    ) -> Self {
        Self {
            kind: ActionKind::Create,
            event_id: None,
            event_type: Some(event_type.into()),
            transaction_id,
            caller_token: caller_token.into(),
            declaration: Payload::new(),
            annotation: Payload::new(),
            request_id: None,
        }
    }

    /// A request to append `kind` to an existing event.
    #[must_use]
    pub fn new(
        kind: ActionKind,
        event_id: EventId,
        caller_token: impl Into<SecretString>,
        transaction_id: TransactionId,
    ) -> Self {
        Self {
            kind,
            event_id: Some(event_id),
            event_type: None,
            transaction_id,
            caller_token: caller_token.into(),
            declaration: Payload::new(),
            annotation: Payload::new(),
            request_id: None,
        }
    }

    /// Sets the declaration (builder pattern).
    #[must_use]
    pub fn with_declaration(mut self, declaration: Payload) -> Self {
        self.declaration = declaration;
        self
    }

    /// Sets the annotation (builder pattern).
    #[must_use]
    pub fn with_annotation(mut self, annotation: Payload) -> Self {
        self.annotation = annotation;
        self
    }

    /// Sets the referenced correction request (builder pattern).
    #[must_use]
    pub const fn with_request(mut self, request_id: ActionId) -> Self {
        self.request_id = Some(request_id);
        self
    }
}
