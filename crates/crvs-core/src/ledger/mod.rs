//! Append-only event ledger.
//!
//! Each event is a header plus an ordered history of actions stored in
//! `SQLite` with WAL mode. Histories are only ever extended; triggers refuse
//! updates and deletes. Each action is hash-chained to its predecessor
//! ([`crate::integrity`]).
//!
//! # Features
//!
//! - **Optimistic concurrency**: appends name the head they were computed
//!   against and fail with [`LedgerError::Conflict`] if it moved
//! - **Legality in the write transaction**: the history is re-folded under
//!   the write lock, so transition checks never see stale state
//! - **Idempotency backstop**: `UNIQUE(event_id, transaction_id)` rejects a
//!   second action with the same transaction id
//! - **Atomic batches**: chained follow-up actions commit with their trigger
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use crvs_core::action::{Action, ActionKind, ActorId, EventId, TransactionId};
//! use crvs_core::ledger::{EventLedger, SqliteLedger};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = EventLedger::new(Arc::new(SqliteLedger::open("/path/to/ledger.db")?));
//! let clerk = ActorId::new("clerk-1")?;
//!
//! let create = Action::new(
//!     EventId::generate(),
//!     ActionKind::Create,
//!     clerk.clone(),
//!     TransactionId::new("t-1")?,
//! );
//! let document = ledger.create("birth", create).await?;
//!
//! let declare = Action::new(document.id, ActionKind::Declare, clerk, TransactionId::new("t-2")?);
//! let document = ledger.append(&document, vec![declare]).await?;
//! assert_eq!(document.actions.len(), 2);
//! # Ok(())
//! # }
//! ```

mod backend;
mod error;
mod event_ledger;
mod storage;

#[cfg(test)]
mod tests;

pub use backend::LedgerBackend;
pub use error::LedgerError;
pub use event_ledger::{DEFAULT_STORAGE_TIMEOUT, DEFAULT_TRACKING_LENGTH, EventLedger};
pub use storage::{DEFAULT_BUSY_TIMEOUT, LedgerStats, SqliteLedger};
