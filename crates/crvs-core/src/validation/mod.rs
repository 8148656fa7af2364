//! Schema-driven validation of action payloads.
//!
//! The validator evaluates a request against the event's data as it would
//! stand after the action: the projected declaration, overlaid with the
//! request declaration, overlaid with the request annotation. Every problem
//! is collected before returning, so callers can fix all of them at once.
//!
//! Hidden fields are neither required nor kept: values supplied for them are
//! stripped from the returned payload.

mod error;


use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

pub use self::error::{FieldError, ValidationError};
use crate::BoxFuture;
use crate::action::{ActionKind, Payload};
use crate::deadline::bounded;
use crate::location::{LocationError, LocationResolver};
use crate::schema::{
    ActionSchema, FieldDefinition, FieldProblem, FieldType, SchemaError, SchemaProvider,
    is_present,
};

/// Pseudo-field used for an unknown event type.
pub const EVENT_TYPE_FIELD: &str = "eventType";

/// Pseudo-field used for a declaration sent with a kind that takes none.
pub const DECLARATION_FIELD: &str = "declaration";

/// Default limit for a single collaborator call.
pub const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(2);

/// The request payload as it will be stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedPayload {
    /// Declaration with hidden fields removed.
    pub declaration: Payload,
    /// Annotation with hidden fields removed.
    pub annotation: Payload,
}

/// Rejects a declaration on kinds that do not carry one.
///
/// # Errors
///
/// Returns a single field error on [`DECLARATION_FIELD`].
pub fn check_declaration_allowed(
    kind: &ActionKind,
    declaration: &Payload,
) -> Result<(), ValidationError> {
    if declaration.is_empty() || kind.accepts_declaration() {
        return Ok(());
    }
    Err(ValidationError::Invalid(vec![FieldError::new(
        DECLARATION_FIELD,
        FieldProblem::NotAllowed {
            reason: format!("{kind} does not take a declaration"),
        },
    )]))
}

/// Validates action payloads against configured field definitions.
pub struct ActionValidator {
    schemas: Arc<dyn SchemaProvider>,
    locations: Arc<dyn LocationResolver>,
    timeout: Duration,
}

impl std::fmt::Debug for ActionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionValidator")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ActionValidator {
    /// Creates a validator with the default collaborator timeout.
    #[must_use]
    pub fn new(schemas: Arc<dyn SchemaProvider>, locations: Arc<dyn LocationResolver>) -> Self {
        Self {
            schemas,
            locations,
            timeout: DEFAULT_COLLABORATOR_TIMEOUT,
        }
    }

    /// Sets the collaborator timeout (builder pattern).
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks that `event_type` is configured.
    ///
    /// # Errors
    ///
    /// Returns a field error on [`EVENT_TYPE_FIELD`] for an unknown type,
    /// or `Unavailable`.
    pub async fn check_event_type(&self, event_type: &str) -> Result<(), ValidationError> {
        self.schema(event_type, &ActionKind::Create).await.map(|_| ())
    }

    async fn schema(
        &self,
        event_type: &str,
        kind: &ActionKind,
    ) -> Result<ActionSchema, ValidationError> {
        match bounded(
            self.timeout,
            self.schemas.field_definitions(event_type, kind),
        )
        .await
        {
            Ok(Ok(schema)) => Ok(schema),
            Ok(Err(SchemaError::UnknownEventType { .. })) => {
                Err(ValidationError::Invalid(vec![FieldError::new(
                    EVENT_TYPE_FIELD,
                    FieldProblem::UnknownEventType,
                )]))
            },
            Ok(Err(err)) => Err(ValidationError::Unavailable {
                collaborator: "schema",
                reason: err.to_string(),
            }),
            Err(elapsed) => {
                warn!(limit_ms = elapsed.limit.as_millis(), "schema provider timed out");
                Err(ValidationError::timed_out("schema", elapsed.limit))
            },
        }
    }

    /// Validates a request payload for `kind` on an event of `event_type`
    /// whose projected declaration is `current`.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` with every field problem found, or `Unavailable` if
    /// the schema provider or location resolver fails or times out.
    pub async fn validate(
        &self,
        event_type: &str,
        kind: &ActionKind,
        current: &Payload,
        declaration: &Payload,
        annotation: &Payload,
    ) -> Result<ValidatedPayload, ValidationError> {
        check_declaration_allowed(kind, declaration)?;
        let schema = self.schema(event_type, kind).await?;

        let mut merged = current.clone();
        merged.extend(declaration.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.extend(annotation.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut errors = Vec::new();
        for (page, field) in schema.fields() {
            if !ActionSchema::is_visible(page, field, &merged) {
                continue;
            }
            match merged.get(&field.id).filter(|v| is_present(v)) {
                None if field.required => {
                    errors.push(FieldError::new(&field.id, FieldProblem::Required));
                },
                None => {},
                Some(value) => {
                    if let Err(problem) = field.field_type.check_shape(value) {
                        errors.push(FieldError::new(&field.id, problem));
                    } else if let Some(problem) = self.check_location(field, value).await? {
                        errors.push(FieldError::new(&field.id, problem));
                    }
                },
            }
        }

        if !errors.is_empty() {
            debug!(
                %kind,
                event_type,
                errors = errors.len(),
                "payload rejected"
            );
            return Err(ValidationError::Invalid(errors));
        }

        let hidden = schema.hidden_fields(&merged);
        let strip = |payload: &Payload| -> Payload {
            payload
                .iter()
                .filter(|(key, _)| !hidden.contains(&key.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };
        Ok(ValidatedPayload {
            declaration: strip(declaration),
            annotation: strip(annotation),
        })
    }

    async fn check_location(
        &self,
        field: &FieldDefinition,
        value: &serde_json::Value,
    ) -> Result<Option<FieldProblem>, ValidationError> {
        let FieldType::Location { within } = &field.field_type else {
            return Ok(None);
        };
        let Some(id) = value.as_str() else {
            return Ok(None);
        };

        if !self.ask_locations(self.locations.exists(id)).await? {
            return Ok(Some(FieldProblem::UnknownLocation));
        }
        if let Some(within) = within {
            let inside = self
                .ask_locations(self.locations.is_under_jurisdiction(within, id))
                .await?;
            if !inside {
                return Ok(Some(FieldProblem::OutsideJurisdiction {
                    within: within.clone(),
                }));
            }
        }
        Ok(None)
    }

    async fn ask_locations(
        &self,
        fut: BoxFuture<'_, Result<bool, LocationError>>,
    ) -> Result<bool, ValidationError> {
        match bounded(self.timeout, fut).await {
            Ok(Ok(answer)) => Ok(answer),
            Ok(Err(err)) => Err(ValidationError::Unavailable {
                collaborator: "location",
                reason: err.to_string(),
            }),
            Err(elapsed) => {
                warn!(limit_ms = elapsed.limit.as_millis(), "location resolver timed out");
                Err(ValidationError::timed_out("location", elapsed.limit))
            },
        }
    }
}
