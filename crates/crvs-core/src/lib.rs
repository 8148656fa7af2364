// Storage rows use i64 for counts and positions, which are always
// non-negative here.
#![allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
#![allow(clippy::doc_markdown)]

//! crvs-core - event/action ledger for civil-registration declarations.
//!
//! Every change to a declaration (birth, death, marriage, or any configured
//! event type) is recorded as an immutable [`action::Action`] appended to the
//! history of one event. The current state of a declaration is never stored;
//! it is derived by folding the action history ([`projection`]).
//!
//! # Request pipeline
//!
//! ```text
//! ActionRouter::handle
//!     |
//!     v
//! ScopeChecker::authorize ---> Forbidden
//!     |
//!     v
//! IdempotencyGuard::dedupe ---> replayed document
//!     |
//!     v
//! AssignmentCoordinator ---> Conflict
//!     |
//!     v
//! ActionValidator (SchemaProvider, LocationResolver) ---> Validation
//!     |
//!     v
//! EventLedger::append ---> Conflict / State
//!     |
//!     v
//! auto-unassign chaining, EventDocument
//! ```
//!
//! # Modules
//!
//! - [`action`]: action kinds, identifiers and the immutable action record
//! - [`reducer`]: reducer trait used by projections
//! - [`projection`]: status state machine, projected state and documents
//! - [`integrity`]: per-event BLAKE3 action hash chain
//! - [`ledger`]: SQLite-backed append-only storage and the event ledger
//! - [`schema`]: field definitions, conditions and the schema provider seam
//! - [`validation`]: schema-driven action validation
//! - [`location`]: location hierarchy resolver seam
//! - [`identity`]: caller identity and capability scopes
//! - [`assignment`]: single-writer assignment policy
//! - [`idempotency`]: transaction-id deduplication
//! - [`router`]: the orchestrating request handler
//! - [`config`]: TOML configuration

use std::future::Future;
use std::pin::Pin;

pub mod action;
pub mod assignment;
pub mod config;
mod deadline;
pub mod identity;
pub mod idempotency;
pub mod integrity;
pub mod ledger;
pub mod location;
pub mod projection;
pub mod reducer;
pub mod router;
pub mod schema;
pub mod validation;

/// Boxed, sendable future returned by the async collaborator seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use action::{Action, ActionId, ActionKind, ActorId, EventId, Payload, TransactionId};
pub use projection::{EventDocument, EventStatus, ProjectedState};
pub use router::{ActionError, ActionRequest, ActionRouter, RouterConfig};
