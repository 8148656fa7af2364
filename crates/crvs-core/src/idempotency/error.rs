//! Idempotency errors.

use thiserror::Error;

use crate::action::{ActionKind, TransactionId};
use crate::ledger::LedgerError;
use crate::projection::ProjectionError;

/// Errors from looking up a prior result.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IdempotencyError {
    /// The transaction id was already used for a different action kind.
    #[error("transaction {transaction_id} was used for {original}, not {requested}")]
    TransactionReused {
        /// The reused id.
        transaction_id: TransactionId,
        /// Kind recorded under the id.
        original: ActionKind,
        /// Kind requested now.
        requested: ActionKind,
    },

    /// The ledger lookup failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The stored history could not be re-projected.
    #[error("failed to rebuild prior result: {0}")]
    Projection(#[from] ProjectionError),
}
