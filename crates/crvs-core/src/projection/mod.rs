//! Projection: the derived, never-stored view of an event.
//!
//! The current state of a declaration is computed by folding its action
//! history with [`EventProjection`]. Folding is pure and deterministic;
//! [`ProjectionCache`] only memoises results keyed by the history head.
//!
//! # Example
//!
//! ```rust
//! use crvs_core::action::{
//!     Action, ActionKind, ActorId, EventHeader, EventId, TrackingId, TransactionId,
//! };
//! use crvs_core::projection::{EventStatus, fold};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let header = EventHeader {
//!     id: EventId::generate(),
//!     event_type: "birth".into(),
//!     tracking_id: TrackingId::from_stored("B7K3QZP"),
//!     created_at_ns: 1,
//! };
//! let clerk = ActorId::new("clerk-1")?;
//! let history = vec![
//!     Action::new(header.id, ActionKind::Create, clerk.clone(), TransactionId::new("t1")?),
//!     Action::new(header.id, ActionKind::Declare, clerk.clone(), TransactionId::new("t2")?),
//! ];
//!
//! let state = fold(&header, &history)?;
//! assert_eq!(state.status, EventStatus::Declared);
//! assert!(state.is_assigned_to(&clerk));
//! # Ok(())
//! # }
//! ```

mod cache;
mod document;
mod error;
mod reducer;
mod state;
mod transition;


pub use cache::{DEFAULT_CACHE_CAPACITY, ProjectionCache};
pub use document::EventDocument;
pub use error::ProjectionError;
pub use reducer::{
    DUPLICATE_FLAG_KEY, EventProjection, REGISTRATION_NUMBER_KEY, REJECTION_REASON_KEY, fold,
};
pub use state::{Assignment, EventStatus, PendingCorrection, ProjectedState, status_name};
pub use transition::{
    TransitionError, check_transition, is_legal, legal_next_kinds, target_status,
};
