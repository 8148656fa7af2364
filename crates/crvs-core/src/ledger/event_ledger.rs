//! The event ledger: aggregate root over one backend.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::backend::LedgerBackend;
use super::error::LedgerError;
use super::storage::LedgerStats;
use crate::BoxFuture;
use crate::action::{Action, EventHeader, EventId, TrackingId, TransactionId};
use crate::deadline::bounded;
use crate::integrity::ActionHasher;
use crate::projection::{EventDocument, ProjectedState, ProjectionCache, fold};

/// Default limit for a single storage call.
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default tracking id length.
pub const DEFAULT_TRACKING_LENGTH: usize = 7;

/// Tracking ids are regenerated this many times before giving up.
const MAX_TRACKING_ATTEMPTS: usize = 5;

/// Owns event histories and exposes their projections.
///
/// Every call into the backend is bounded by the storage timeout. Appends
/// are optimistic: the caller passes the document it computed against, and
/// the append fails with [`LedgerError::Conflict`] if anything was appended
/// since.
pub struct EventLedger {
    backend: Arc<dyn LedgerBackend>,
    cache: ProjectionCache,
    storage_timeout: Duration,
    tracking_length: usize,
}

impl std::fmt::Debug for EventLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLedger")
            .field("cache", &self.cache)
            .field("storage_timeout", &self.storage_timeout)
            .field("tracking_length", &self.tracking_length)
            .finish_non_exhaustive()
    }
}

impl EventLedger {
    /// Creates a ledger over `backend` with default limits.
    #[must_use]
    pub fn new(backend: Arc<dyn LedgerBackend>) -> Self {
        Self {
            backend,
            cache: ProjectionCache::default(),
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
            tracking_length: DEFAULT_TRACKING_LENGTH,
        }
    }

    /// Sets the storage timeout (builder pattern).
    #[must_use]
    pub const fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    /// Sets the tracking id length (builder pattern).
    #[must_use]
    pub const fn with_tracking_length(mut self, length: usize) -> Self {
        self.tracking_length = length;
        self
    }

    /// Replaces the projection cache (builder pattern).
    #[must_use]
    pub fn with_cache(mut self, cache: ProjectionCache) -> Self {
        self.cache = cache;
        self
    }

    /// Returns the storage backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn LedgerBackend> {
        &self.backend
    }

    async fn call<T>(&self, fut: BoxFuture<'_, Result<T, LedgerError>>) -> Result<T, LedgerError> {
        match bounded(self.storage_timeout, fut).await {
            Ok(result) => result,
            Err(elapsed) => {
                warn!(limit_ms = elapsed.limit.as_millis(), "storage call timed out");
                Err(LedgerError::Timeout {
                    limit: elapsed.limit,
                })
            },
        }
    }

    /// Loads an event's document: header, full history and projection.
    ///
    /// # Errors
    ///
    /// Returns `EventNotFound` for an unknown event, `Timeout` if storage
    /// does not answer in time, or a projection error for a corrupt history.
    pub async fn load(&self, event_id: EventId) -> Result<EventDocument, LedgerError> {
        let header = self.call(self.backend.get_event(event_id)).await?;
        let actions = self.call(self.backend.get_actions(event_id)).await?;
        let state = self.project(&header, &actions)?;
        Ok(EventDocument::with_state(header, actions, state))
    }

    /// Returns an event's current projected state.
    ///
    /// # Errors
    ///
    /// As [`EventLedger::load`].
    pub async fn state(&self, event_id: EventId) -> Result<ProjectedState, LedgerError> {
        Ok(self.load(event_id).await?.state)
    }

    fn project(
        &self,
        header: &EventHeader,
        actions: &[Action],
    ) -> Result<ProjectedState, LedgerError> {
        if let Some(last) = actions.last() {
            if let Some(state) = self.cache.get(&header.id, &last.id) {
                return Ok(state);
            }
        }
        let state = fold(header, actions)?;
        self.cache.insert(state.clone());
        Ok(state)
    }

    /// Creates a new event of `event_type` from its `CREATE` action.
    ///
    /// The event id is taken from `create.event_id`; a tracking id is
    /// generated and regenerated on collision.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateTransaction` if the create transaction was already
    /// used, `TrackingIdCollision` if no free tracking id was found, or
    /// `Timeout`.
    pub async fn create(
        &self,
        event_type: &str,
        create: Action,
    ) -> Result<EventDocument, LedgerError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let header = EventHeader {
                id: create.event_id,
                event_type: event_type.to_string(),
                tracking_id: TrackingId::generate(self.tracking_length),
                created_at_ns: create.created_at_ns,
            };
            match self
                .call(self.backend.create_event(header.clone(), create.clone()))
                .await
            {
                Ok(sealed) => {
                    debug!(
                        event_id = %header.id,
                        tracking_id = %header.tracking_id,
                        "event created"
                    );
                    let document = EventDocument::from_history(header, vec![sealed])?;
                    self.cache.insert(document.state.clone());
                    return Ok(document);
                },
                Err(LedgerError::TrackingIdCollision { tracking_id })
                    if attempt < MAX_TRACKING_ATTEMPTS =>
                {
                    debug!(%tracking_id, attempt, "tracking id collision, regenerating");
                },
                Err(err) => return Err(err),
            }
        }
    }

    /// Appends `actions` on top of `base`, which must be the current head
    /// of the event.
    ///
    /// Returns the document as it stands right after this append: `base`
    /// plus the sealed actions.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if `base` is stale, `DuplicateTransaction`,
    /// `IllegalTransition`, or `Timeout`.
    pub async fn append(
        &self,
        base: &EventDocument,
        actions: Vec<Action>,
    ) -> Result<EventDocument, LedgerError> {
        let Some(head) = base.last_action() else {
            return Err(LedgerError::EventNotFound { event_id: base.id });
        };
        let sealed = self
            .call(self.backend.append_if_legal(base.id, head.id, actions))
            .await?;

        debug!(event_id = %base.id, appended = sealed.len(), "actions appended");

        let mut history = base.actions.clone();
        history.extend(sealed);
        let document = EventDocument::from_history(base.header(), history)?;
        self.cache.insert(document.state.clone());
        Ok(document)
    }

    /// Finds the action recorded for `transaction_id` on an event.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or times out.
    pub async fn find_action_by_transaction(
        &self,
        event_id: EventId,
        transaction_id: &TransactionId,
    ) -> Result<Option<Action>, LedgerError> {
        self.call(
            self.backend
                .find_action_by_transaction(event_id, transaction_id.clone()),
        )
        .await
    }

    /// Finds the event created by `transaction_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or times out.
    pub async fn find_event_by_create_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<EventId>, LedgerError> {
        self.call(
            self.backend
                .find_event_by_create_transaction(transaction_id.clone()),
        )
        .await
    }

    /// Re-derives the hash chain of an event and checks that its history
    /// folds. Returns the number of verified actions.
    ///
    /// # Errors
    ///
    /// Returns `Integrity` for a broken chain, a projection error for an
    /// illegal history, or `EventNotFound`.
    pub async fn verify_history(&self, event_id: EventId) -> Result<usize, LedgerError> {
        let header = self.call(self.backend.get_event(event_id)).await?;
        let actions = self.call(self.backend.get_actions(event_id)).await?;
        ActionHasher::verify_chain(&actions)?;
        fold(&header, &actions)?;
        Ok(actions.len())
    }

    /// Lists event headers, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or times out.
    pub async fn list_events(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<EventHeader>, LedgerError> {
        self.call(self.backend.list_events(offset, limit)).await
    }

    /// Returns storage statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or times out.
    pub async fn stats(&self) -> Result<LedgerStats, LedgerError> {
        self.call(self.backend.stats()).await
    }
}
