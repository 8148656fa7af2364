//! The immutable action record and the event header.

// Nanosecond timestamps won't overflow u64 until the year 2554.
#![allow(clippy::cast_possible_truncation)]

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::ids::{ActionId, ActorId, EventId, TrackingId, TransactionId};
use super::kind::ActionKind;

/// Field-value pairs carried by an action. Ordered so that serialisation and
/// hashing are deterministic.
pub type Payload = BTreeMap<String, serde_json::Value>;

/// Returns the current wall-clock time in nanoseconds since the Unix epoch.
#[must_use]
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// One appended record in an event's history.
///
/// `position`, `prev_hash` and `hash` are assigned by the ledger when the
/// action is appended; an action read back from the ledger always has them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Action identity.
    pub id: ActionId,

    /// Event this action belongs to.
    pub event_id: EventId,

    /// What the action does.
    pub kind: ActionKind,

    /// Actor that submitted the action.
    pub created_by: ActorId,

    /// Submission time in nanoseconds since the Unix epoch.
    pub created_at_ns: u64,

    /// Client-supplied idempotency key.
    pub transaction_id: TransactionId,

    /// Declaration fields, merged cumulatively into the projected state.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub declaration: Payload,

    /// Action-scoped data that is not merged into the declaration.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotation: Payload,

    /// Prior action this one refers to (correction review -> request).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<ActionId>,

    /// 1-based position in the event history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,

    /// Hash of the previous action (hex), zero hash for the first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,

    /// Hash of this action chained onto `prev_hash` (hex).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// The hashed portion of an action: everything the submitter chose plus the
/// ledger-assigned position.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionContent<'a> {
    id: &'a ActionId,
    event_id: &'a EventId,
    position: u64,
    kind: &'a ActionKind,
    created_by: &'a ActorId,
    created_at_ns: u64,
    transaction_id: &'a TransactionId,
    declaration: &'a Payload,
    annotation: &'a Payload,
    request_id: &'a Option<ActionId>,
}

impl Action {
    /// Creates an unsealed action stamped with the current time.
    #[must_use]
    pub fn new(
        event_id: EventId,
        kind: ActionKind,
        created_by: ActorId,
        transaction_id: TransactionId,
    ) -> Self {
        Self::with_timestamp(event_id, kind, created_by, transaction_id, now_ns())
    }

    /// Creates an unsealed action with a specific timestamp.
    #[must_use]
    pub fn with_timestamp(
        event_id: EventId,
        kind: ActionKind,
        created_by: ActorId,
        transaction_id: TransactionId,
        created_at_ns: u64,
    ) -> Self {
        Self {
            id: ActionId::generate(),
            event_id,
            kind,
            created_by,
            created_at_ns,
            transaction_id,
            declaration: Payload::new(),
            annotation: Payload::new(),
            request_id: None,
            position: None,
            prev_hash: None,
            hash: None,
        }
    }

    /// Sets the declaration payload (builder pattern).
    #[must_use]
    pub fn with_declaration(mut self, declaration: Payload) -> Self {
        self.declaration = declaration;
        self
    }

    /// Sets the annotation payload (builder pattern).
    #[must_use]
    pub fn with_annotation(mut self, annotation: Payload) -> Self {
        self.annotation = annotation;
        self
    }

    /// Sets the referenced prior action (builder pattern).
    #[must_use]
    pub const fn with_request(mut self, request_id: ActionId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Returns `true` once the ledger has assigned position and hashes.
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.position.is_some() && self.prev_hash.is_some() && self.hash.is_some()
    }

    /// Returns the canonical bytes covered by the action hash.
    ///
    /// # Errors
    ///
    /// Returns an error if a payload value cannot be serialised.
    pub fn content_bytes(&self, position: u64) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&ActionContent {
            id: &self.id,
            event_id: &self.event_id,
            position,
            kind: &self.kind,
            created_by: &self.created_by,
            created_at_ns: self.created_at_ns,
            transaction_id: &self.transaction_id,
            declaration: &self.declaration,
            annotation: &self.annotation,
            request_id: &self.request_id,
        })
    }
}

/// Event-level data fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHeader {
    /// Event identity.
    pub id: EventId,

    /// Configured event type (`birth`, `death`, ...).
    pub event_type: String,

    /// Human-shareable tracking identifier.
    pub tracking_id: TrackingId,

    /// Creation time in nanoseconds since the Unix epoch.
    pub created_at_ns: u64,
}
