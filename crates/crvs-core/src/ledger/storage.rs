//! `SQLite`-backed ledger storage implementation.
//!
//! This module uses `SQLite` with WAL mode for the underlying storage.
//! [`SqliteLedger`] implements the [`LedgerBackend`] trait; its synchronous
//! methods run on tokio's blocking pool when driven through the trait.
//!
//! Appends run inside an `IMMEDIATE` transaction, so the write lock is taken
//! before the head of the history is read. Together with the
//! `UNIQUE(event_id, position)` and `UNIQUE(event_id, transaction_id)`
//! constraints this serialises appends to one event across connections and
//! processes.

// SQLite returns i64 for positions and counts, but they're always non-negative.
// Mutex poisoning indicates a panic in another thread, which is unrecoverable.
#![allow(clippy::cast_sign_loss, clippy::missing_panics_doc)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{
    Connection, ErrorCode, OpenFlags, OptionalExtension, Row, Transaction, TransactionBehavior,
    params,
};
use serde::Serialize;

use super::backend::LedgerBackend;
use super::error::LedgerError;
use crate::BoxFuture;
use crate::action::{
    Action, ActionId, ActionKind, ActorId, EventHeader, EventId, TrackingId, TransactionId,
};
use crate::integrity::ActionHasher;
use crate::projection::EventProjection;
use crate::reducer::{Reducer, ReducerContext, replay};

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Default time a connection waits on a locked database.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ACTION_COLUMNS: &str = "id, event_id, position, kind, created_by, created_at_ns, \
     transaction_id, declaration, annotation, request_id, prev_hash, hash";

const EVENT_COLUMNS: &str = "id, event_type, tracking_id, created_at_ns";

/// Statistics about the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStats {
    /// Total number of events.
    pub event_count: u64,

    /// Total number of actions.
    pub action_count: u64,

    /// Database file size in bytes.
    pub db_size_bytes: u64,
}

/// The append-only event ledger backed by `SQLite`.
///
/// Cloning is cheap and shares the underlying connection.
#[derive(Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLedger")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteLedger {
    /// Opens or creates a ledger at the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Opens or creates a ledger, waiting up to `busy_timeout` for locks held
    /// by other connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open_with_busy_timeout(
        path: impl AsRef<Path>,
        busy_timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(busy_timeout)?;
        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Returns the database path, `None` for in-memory ledgers.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn initialize_connection(conn: &Connection) -> Result<(), LedgerError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Creates an event and appends its `CREATE` action as position 1.
    ///
    /// Returns the sealed `CREATE` action.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateTransaction` if an event was already created with
    /// the same transaction id, `TrackingIdCollision` if the tracking id is
    /// taken, or a projection error if `create` is not a `CREATE` action for
    /// `header`.
    pub fn create_event(&self, header: &EventHeader, create: Action) -> Result<Action, LedgerError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if Self::event_by_create_transaction(&tx, &create.transaction_id)?.is_some() {
            return Err(LedgerError::DuplicateTransaction {
                event_id: None,
                transaction_id: create.transaction_id,
            });
        }

        let mut projection = EventProjection::new(header.clone());
        projection.apply(&create, &ReducerContext::new(1))?;

        tx.execute(
            "INSERT INTO events (id, event_type, tracking_id, created_at_ns, create_transaction_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                header.id.to_string(),
                header.event_type,
                header.tracking_id.as_str(),
                header.created_at_ns as i64,
                create.transaction_id.as_str(),
            ],
        )
        .map_err(|e| {
            let violated = constraint_message(&e).map(str::to_owned);
            match violated.as_deref() {
                Some(msg) if msg.contains("events.tracking_id") => {
                    LedgerError::TrackingIdCollision {
                        tracking_id: header.tracking_id.to_string(),
                    }
                },
                Some(msg) if msg.contains("events.create_transaction_id") => {
                    LedgerError::DuplicateTransaction {
                        event_id: None,
                        transaction_id: create.transaction_id.clone(),
                    }
                },
                _ => LedgerError::Database(e),
            }
        })?;

        let mut create = create;
        ActionHasher::seal(&mut create, 1, &ActionHasher::GENESIS_PREV_HASH)?;
        Self::insert_action(&tx, &create)?;

        tx.commit()?;
        Ok(create)
    }

    /// Appends `actions` to an existing event if its head is still
    /// `expected_last` and every action is legal in sequence.
    ///
    /// The batch commits atomically: either every action is appended or
    /// none is. Returns the sealed actions.
    ///
    /// # Errors
    ///
    /// - `EventNotFound` if the event does not exist.
    /// - `DuplicateTransaction` if any transaction id is already recorded
    ///   for the event.
    /// - `Conflict` if the head is not `expected_last`.
    /// - `IllegalTransition` if an action is not legal in the status it
    ///   would be applied in.
    pub fn append_if_legal(
        &self,
        event_id: EventId,
        expected_last: ActionId,
        actions: Vec<Action>,
    ) -> Result<Vec<Action>, LedgerError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let header = Self::header(&tx, event_id)?.ok_or(LedgerError::EventNotFound { event_id })?;

        for action in &actions {
            if Self::action_by_transaction(&tx, event_id, &action.transaction_id)?.is_some() {
                return Err(LedgerError::DuplicateTransaction {
                    event_id: Some(event_id),
                    transaction_id: action.transaction_id.clone(),
                });
            }
        }

        let history = Self::actions(&tx, event_id)?;
        let head = history.last().map(|a| a.id);
        if head != Some(expected_last) {
            return Err(LedgerError::Conflict {
                event_id,
                expected: expected_last,
                actual: head,
            });
        }

        let mut projection = EventProjection::new(header);
        replay(&mut projection, &history)?;

        let mut prev_hash = ActionHasher::head_hash(history.last())?;
        let mut position = history.len() as u64;
        let mut sealed = Vec::with_capacity(actions.len());

        for mut action in actions {
            position += 1;
            projection
                .apply(&action, &ReducerContext::new(position))
                .map_err(|e| LedgerError::from_append(event_id, e))?;
            prev_hash = ActionHasher::seal(&mut action, position, &prev_hash)?;
            Self::insert_action(&tx, &action).map_err(|e| {
                let violated = match &e {
                    LedgerError::Database(inner) => constraint_message(inner).map(str::to_owned),
                    _ => None,
                };
                match violated.as_deref() {
                    Some(msg) if msg.contains("actions.transaction_id") => {
                        LedgerError::DuplicateTransaction {
                            event_id: Some(event_id),
                            transaction_id: action.transaction_id.clone(),
                        }
                    },
                    Some(msg) if msg.contains("actions.position") => LedgerError::Conflict {
                        event_id,
                        expected: expected_last,
                        actual: None,
                    },
                    _ => e,
                }
            })?;
            sealed.push(action);
        }

        tx.commit()?;
        Ok(sealed)
    }

    /// Reads an event header.
    ///
    /// # Errors
    ///
    /// Returns `EventNotFound` if no event exists with that id.
    pub fn get_event(&self, event_id: EventId) -> Result<EventHeader, LedgerError> {
        let conn = self.conn.lock().unwrap();
        Self::header(&conn, event_id)?.ok_or(LedgerError::EventNotFound { event_id })
    }

    /// Reads the complete history of an event in append order.
    ///
    /// Returns an empty history for an unknown event.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn get_actions(&self, event_id: EventId) -> Result<Vec<Action>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        Self::actions(&conn, event_id)
    }

    /// Finds the action recorded for `transaction_id` on an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_action_by_transaction(
        &self,
        event_id: EventId,
        transaction_id: &TransactionId,
    ) -> Result<Option<Action>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        Self::action_by_transaction(&conn, event_id, transaction_id)
    }

    /// Finds the event created by `transaction_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_event_by_create_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<EventId>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        Self::event_by_create_transaction(&conn, transaction_id)
    }

    /// Lists event headers, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_events(&self, offset: u64, limit: u64) -> Result<Vec<EventHeader>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             ORDER BY created_at_ns ASC, id ASC
             LIMIT ?1 OFFSET ?2"
        ))?;
        let headers = stmt
            .query_map(params![limit as i64, offset as i64], row_to_header)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(headers)
    }

    /// Gets statistics about the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be gathered.
    pub fn stats(&self) -> Result<LedgerStats, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let event_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        let action_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM actions", [], |row| row.get(0))?;

        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;

        Ok(LedgerStats {
            event_count: event_count as u64,
            action_count: action_count as u64,
            db_size_bytes: (page_count * page_size) as u64,
        })
    }

    /// Verifies that WAL mode is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal mode cannot be queried.
    pub fn verify_wal_mode(&self) -> Result<bool, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        Ok(mode.eq_ignore_ascii_case("wal"))
    }

    fn header(conn: &Connection, event_id: EventId) -> Result<Option<EventHeader>, LedgerError> {
        let header = conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
                params![event_id.to_string()],
                row_to_header,
            )
            .optional()?;
        Ok(header)
    }

    fn actions(conn: &Connection, event_id: EventId) -> Result<Vec<Action>, LedgerError> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ACTION_COLUMNS} FROM actions WHERE event_id = ?1 ORDER BY position ASC"
        ))?;
        let actions = stmt
            .query_map(params![event_id.to_string()], row_to_action)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(actions)
    }

    fn action_by_transaction(
        conn: &Connection,
        event_id: EventId,
        transaction_id: &TransactionId,
    ) -> Result<Option<Action>, LedgerError> {
        let action = conn
            .query_row(
                &format!(
                    "SELECT {ACTION_COLUMNS} FROM actions
                     WHERE event_id = ?1 AND transaction_id = ?2"
                ),
                params![event_id.to_string(), transaction_id.as_str()],
                row_to_action,
            )
            .optional()?;
        Ok(action)
    }

    fn event_by_create_transaction(
        conn: &Connection,
        transaction_id: &TransactionId,
    ) -> Result<Option<EventId>, LedgerError> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT id FROM events WHERE create_transaction_id = ?1",
                params![transaction_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|raw| {
            EventId::parse(&raw).map_err(|e| LedgerError::Corrupt {
                details: e.to_string(),
            })
        })
        .transpose()
    }

    fn insert_action(tx: &Transaction<'_>, action: &Action) -> Result<(), LedgerError> {
        let declaration = serde_json::to_string(&action.declaration)?;
        let annotation = serde_json::to_string(&action.annotation)?;
        tx.execute(
            &format!(
                "INSERT INTO actions ({ACTION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                action.id.to_string(),
                action.event_id.to_string(),
                action.position.map(|p| p as i64),
                action.kind.as_str(),
                action.created_by.as_str(),
                action.created_at_ns as i64,
                action.transaction_id.as_str(),
                declaration,
                annotation,
                action.request_id.map(|id| id.to_string()),
                action.prev_hash,
                action.hash,
            ],
        )?;
        Ok(())
    }
}

/// Returns the message of a constraint violation, if `err` is one.
fn constraint_message(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(code, Some(msg))
            if code.code == ErrorCode::ConstraintViolation =>
        {
            Some(msg.as_str())
        },
        _ => None,
    }
}

fn decode_err<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn row_to_header(row: &Row<'_>) -> rusqlite::Result<EventHeader> {
    let id: String = row.get(0)?;
    Ok(EventHeader {
        id: EventId::parse(&id).map_err(|e| decode_err(0, e))?,
        event_type: row.get(1)?,
        tracking_id: TrackingId::from_stored(row.get::<_, String>(2)?),
        created_at_ns: row.get::<_, i64>(3)? as u64,
    })
}

fn row_to_action(row: &Row<'_>) -> rusqlite::Result<Action> {
    let id: String = row.get(0)?;
    let event_id: String = row.get(1)?;
    let kind: String = row.get(3)?;
    let created_by: String = row.get(4)?;
    let transaction_id: String = row.get(6)?;
    let declaration: String = row.get(7)?;
    let annotation: String = row.get(8)?;
    let request_id: Option<String> = row.get(9)?;

    Ok(Action {
        id: ActionId::parse(&id).map_err(|e| decode_err(0, e))?,
        event_id: EventId::parse(&event_id).map_err(|e| decode_err(1, e))?,
        position: Some(row.get::<_, i64>(2)? as u64),
        kind: ActionKind::parse(&kind).map_err(|e| decode_err(3, e))?,
        created_by: ActorId::new(created_by).map_err(|e| decode_err(4, e))?,
        created_at_ns: row.get::<_, i64>(5)? as u64,
        transaction_id: TransactionId::new(transaction_id).map_err(|e| decode_err(6, e))?,
        declaration: serde_json::from_str(&declaration).map_err(|e| decode_err(7, e))?,
        annotation: serde_json::from_str(&annotation).map_err(|e| decode_err(8, e))?,
        request_id: request_id
            .map(|raw| ActionId::parse(&raw))
            .transpose()
            .map_err(|e| decode_err(9, e))?,
        prev_hash: Some(row.get(10)?),
        hash: Some(row.get(11)?),
    })
}

// -----------------------------------------------------------------------------
// LedgerBackend Trait Implementation
// -----------------------------------------------------------------------------

impl SqliteLedger {
    /// Runs `f` on the blocking pool against a clone of this ledger.
    fn blocking<T, F>(&self, f: F) -> BoxFuture<'static, Result<T, LedgerError>>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> Result<T, LedgerError> + Send + 'static,
    {
        let ledger = self.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || f(&ledger))
                .await
                .map_err(|e| LedgerError::TaskFailed(format!("spawn_blocking failed: {e}")))?
        })
    }
}

impl LedgerBackend for SqliteLedger {
    fn create_event(
        &self,
        header: EventHeader,
        create: Action,
    ) -> BoxFuture<'_, Result<Action, LedgerError>> {
        self.blocking(move |ledger| ledger.create_event(&header, create))
    }

    fn append_if_legal(
        &self,
        event_id: EventId,
        expected_last: ActionId,
        actions: Vec<Action>,
    ) -> BoxFuture<'_, Result<Vec<Action>, LedgerError>> {
        self.blocking(move |ledger| ledger.append_if_legal(event_id, expected_last, actions))
    }

    fn get_event(&self, event_id: EventId) -> BoxFuture<'_, Result<EventHeader, LedgerError>> {
        self.blocking(move |ledger| ledger.get_event(event_id))
    }

    fn get_actions(&self, event_id: EventId) -> BoxFuture<'_, Result<Vec<Action>, LedgerError>> {
        self.blocking(move |ledger| ledger.get_actions(event_id))
    }

    fn find_action_by_transaction(
        &self,
        event_id: EventId,
        transaction_id: TransactionId,
    ) -> BoxFuture<'_, Result<Option<Action>, LedgerError>> {
        self.blocking(move |ledger| ledger.find_action_by_transaction(event_id, &transaction_id))
    }

    fn find_event_by_create_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> BoxFuture<'_, Result<Option<EventId>, LedgerError>> {
        self.blocking(move |ledger| ledger.find_event_by_create_transaction(&transaction_id))
    }

    fn list_events(
        &self,
        offset: u64,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<EventHeader>, LedgerError>> {
        self.blocking(move |ledger| ledger.list_events(offset, limit))
    }

    fn stats(&self) -> BoxFuture<'_, Result<LedgerStats, LedgerError>> {
        self.blocking(SqliteLedger::stats)
    }
}
