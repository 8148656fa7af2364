//! Action model: the immutable records that make up an event's history.
//!
//! An event is never stored as a mutable row. It is an [`EventHeader`] plus
//! an ordered, append-only sequence of [`Action`]s, the first of which is
//! always [`ActionKind::Create`]. Corrections are new actions, never edits.
//!
//! # Example
//!
//! ```rust
//! use crvs_core::action::{Action, ActionKind, ActorId, EventId, Payload, TransactionId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut declaration = Payload::new();
//! declaration.insert("child.dob".into(), serde_json::json!("2024-02-01"));
//!
//! let action = Action::new(
//!     EventId::generate(),
//!     ActionKind::Declare,
//!     ActorId::new("clerk-7")?,
//!     TransactionId::new("c0ffee-1")?,
//! )
//! .with_declaration(declaration);
//! assert!(!action.is_sealed());
//! # Ok(())
//! # }
//! ```

mod ids;
mod kind;
mod record;

pub use ids::{
    ActionId, ActorId, CHAIN_SEPARATOR, EventId, InvalidId, MAX_CLIENT_ID_LEN, TrackingId,
    TransactionId,
};
pub use kind::{ActionClass, ActionKind, InvalidActionKind, MAX_CUSTOM_KIND_LEN};
pub use record::{Action, EventHeader, Payload, now_ns};
