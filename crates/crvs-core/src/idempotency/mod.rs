//! Transaction-id deduplication.
//!
//! Every request carries a client-chosen transaction id. A retry with the
//! same id returns the original result instead of appending again. The
//! ledger's `UNIQUE(event_id, transaction_id)` constraint is the backstop:
//! when two identical requests race, one append wins and the loser, after
//! its own attempt fails, finds the winner's result here and replays it.

mod error;

#[cfg(test)]
mod tests;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info};

pub use self::error::IdempotencyError;
use crate::action::{ActionKind, EventId, TransactionId};
use crate::ledger::{EventLedger, LedgerError};
use crate::projection::EventDocument;

/// What a transaction id is unique within.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdempotencyKey {
    /// `CREATE`: the event id is generated, so the create transaction id is
    /// unique on its own.
    Create(TransactionId),
    /// Any other kind: unique per event.
    Action {
        /// Target event.
        event_id: EventId,
        /// Client transaction id.
        transaction_id: TransactionId,
    },
}

impl IdempotencyKey {
    /// Returns the transaction id.
    #[must_use]
    pub const fn transaction_id(&self) -> &TransactionId {
        match self {
            Self::Create(transaction_id) | Self::Action { transaction_id, .. } => transaction_id,
        }
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create(txn) => write!(f, "create/{txn}"),
            Self::Action {
                event_id,
                transaction_id,
            } => write!(f, "{event_id}/{transaction_id}"),
        }
    }
}

/// Result of a deduplicated request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The request ran now.
    Fresh(EventDocument),
    /// The request ran before; this is its original result.
    Replayed(EventDocument),
}

impl Outcome {
    /// Returns `true` for a replayed result.
    #[must_use]
    pub const fn is_replay(&self) -> bool {
        matches!(self, Self::Replayed(_))
    }

    /// Returns the document.
    #[must_use]
    pub fn into_document(self) -> EventDocument {
        match self {
            Self::Fresh(document) | Self::Replayed(document) => document,
        }
    }
}

/// Short-circuits requests whose transaction id already committed.
#[derive(Debug, Clone)]
pub struct IdempotencyGuard {
    ledger: Arc<EventLedger>,
}

impl IdempotencyGuard {
    /// Creates a guard reading from `ledger`.
    #[must_use]
    pub const fn new(ledger: Arc<EventLedger>) -> Self {
        Self { ledger }
    }

    /// Returns the original result recorded for `key`, if any.
    ///
    /// The document is truncated to the moment the original request
    /// committed, so a replay is identical to the first response.
    ///
    /// # Errors
    ///
    /// Returns `TransactionReused` if the id was recorded for another kind,
    /// or a ledger error.
    pub async fn lookup(
        &self,
        key: &IdempotencyKey,
        kind: &ActionKind,
    ) -> Result<Option<EventDocument>, IdempotencyError> {
        let event_id = match key {
            IdempotencyKey::Create(txn) => {
                let Some(event_id) = self.ledger.find_event_by_create_transaction(txn).await?
                else {
                    return Ok(None);
                };
                if *kind != ActionKind::Create {
                    return Err(IdempotencyError::TransactionReused {
                        transaction_id: txn.clone(),
                        original: ActionKind::Create,
                        requested: kind.clone(),
                    });
                }
                event_id
            },
            IdempotencyKey::Action {
                event_id,
                transaction_id,
            } => {
                let Some(action) = self
                    .ledger
                    .find_action_by_transaction(*event_id, transaction_id)
                    .await?
                else {
                    return Ok(None);
                };
                if action.kind != *kind {
                    return Err(IdempotencyError::TransactionReused {
                        transaction_id: transaction_id.clone(),
                        original: action.kind,
                        requested: kind.clone(),
                    });
                }
                *event_id
            },
        };

        let document = self.ledger.load(event_id).await?;
        match document.as_of_transaction(key.transaction_id())? {
            Some(original) => Ok(Some(original)),
            None => Err(LedgerError::Corrupt {
                details: format!("transaction {key} indexed but missing from history"),
            }
            .into()),
        }
    }

    /// Runs `compute` unless `key` already has a result.
    ///
    /// If `compute` fails, the key is looked up once more: a concurrent
    /// request with the same key may have committed first, in which case its
    /// result is the answer to this request too.
    ///
    /// # Errors
    ///
    /// Returns the error from `compute`, or a lookup error converted into
    /// `E`.
    pub async fn dedupe<F, Fut, E>(
        &self,
        key: &IdempotencyKey,
        kind: &ActionKind,
        compute: F,
    ) -> Result<Outcome, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<EventDocument, E>>,
        E: From<IdempotencyError>,
    {
        if let Some(original) = self.lookup(key, kind).await? {
            info!(%key, %kind, "replaying prior result");
            return Ok(Outcome::Replayed(original));
        }

        match compute().await {
            Ok(document) => Ok(Outcome::Fresh(document)),
            Err(err) => match self.lookup(key, kind).await {
                Ok(Some(original)) => {
                    info!(%key, %kind, "lost race to identical request, replaying");
                    Ok(Outcome::Replayed(original))
                },
                Ok(None) => Err(err),
                Err(reused @ IdempotencyError::TransactionReused { .. }) => Err(reused.into()),
                Err(lookup_err) => {
                    debug!(%key, error = %lookup_err, "lookup after failure also failed");
                    Err(err)
                },
            },
        }
    }
}
