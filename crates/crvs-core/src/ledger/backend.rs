//! Storage backend seam.

use super::error::LedgerError;
use super::storage::LedgerStats;
use crate::BoxFuture;
use crate::action::{Action, ActionId, EventHeader, EventId, TransactionId};

/// Durable, append-only storage for event histories.
///
/// Implementations must serialise appends per event: `append_if_legal`
/// succeeds only if the stored head is still `expected_last` at commit time,
/// and no two actions of one event may share a transaction id.
///
/// The trait is object safe so the ledger can hold `Arc<dyn LedgerBackend>`.
pub trait LedgerBackend: Send + Sync {
    /// Creates an event with its `CREATE` action, returning the sealed action.
    fn create_event(
        &self,
        header: EventHeader,
        create: Action,
    ) -> BoxFuture<'_, Result<Action, LedgerError>>;

    /// Atomically appends `actions` if the head is `expected_last` and each
    /// action is legal in sequence, returning the sealed actions.
    fn append_if_legal(
        &self,
        event_id: EventId,
        expected_last: ActionId,
        actions: Vec<Action>,
    ) -> BoxFuture<'_, Result<Vec<Action>, LedgerError>>;

    /// Reads an event header.
    fn get_event(&self, event_id: EventId) -> BoxFuture<'_, Result<EventHeader, LedgerError>>;

    /// Reads an event's history in append order.
    fn get_actions(&self, event_id: EventId) -> BoxFuture<'_, Result<Vec<Action>, LedgerError>>;

    /// Finds the action recorded for a transaction on an event.
    fn find_action_by_transaction(
        &self,
        event_id: EventId,
        transaction_id: TransactionId,
    ) -> BoxFuture<'_, Result<Option<Action>, LedgerError>>;

    /// Finds the event created by a transaction.
    fn find_event_by_create_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> BoxFuture<'_, Result<Option<EventId>, LedgerError>>;

    /// Lists event headers, oldest first.
    fn list_events(
        &self,
        offset: u64,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<EventHeader>, LedgerError>>;

    /// Returns storage statistics.
    fn stats(&self) -> BoxFuture<'_, Result<LedgerStats, LedgerError>>;
}
