//! Ledger tests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::BoxFuture;
use crate::action::{
    Action, ActionId, ActionKind, ActorId, EventHeader, EventId, Payload, TrackingId,
    TransactionId,
};
use crate::projection::{EventDocument, EventStatus};

// ============================================================================
// Helpers
// ============================================================================

fn clerk() -> ActorId {
    ActorId::new("clerk-1").unwrap()
}

fn txn(raw: &str) -> TransactionId {
    TransactionId::new(raw).unwrap()
}

fn action(event_id: EventId, kind: ActionKind, raw_txn: &str) -> Action {
    Action::new(event_id, kind, clerk(), txn(raw_txn))
}

fn event_ledger() -> EventLedger {
    EventLedger::new(Arc::new(SqliteLedger::in_memory().unwrap()))
}

async fn created(ledger: &EventLedger, raw_txn: &str) -> EventDocument {
    let create = action(EventId::generate(), ActionKind::Create, raw_txn);
    ledger.create("birth", create).await.unwrap()
}

fn header(event_id: EventId, tracking: &str) -> EventHeader {
    EventHeader {
        id: event_id,
        event_type: "birth".to_string(),
        tracking_id: TrackingId::from_stored(tracking),
        created_at_ns: 1,
    }
}

// ============================================================================
// SqliteLedger
// ============================================================================

#[test]
fn file_ledger_uses_wal_and_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.db");
    let event_id = EventId::generate();

    {
        let ledger = SqliteLedger::open(&path).unwrap();
        assert!(ledger.verify_wal_mode().unwrap());
        ledger
            .create_event(
                &header(event_id, "AAAAAAA"),
                action(event_id, ActionKind::Create, "t1"),
            )
            .unwrap();
    }

    let reopened = SqliteLedger::open(&path).unwrap();
    assert_eq!(reopened.path(), Some(path.as_path()));
    let actions = reopened.get_actions(event_id).unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].position, Some(1));
    assert!(actions[0].is_sealed());
    assert_eq!(reopened.get_event(event_id).unwrap().tracking_id.as_str(), "AAAAAAA");
}

#[test]
fn stored_actions_roundtrip_payloads() {
    let ledger = SqliteLedger::in_memory().unwrap();
    let event_id = EventId::generate();
    let mut declaration = Payload::new();
    declaration.insert("child.name".into(), json!({"firstname": "Ada", "surname": "L"}));
    let create = action(event_id, ActionKind::Create, "t1").with_declaration(declaration.clone());
    let sealed = ledger.create_event(&header(event_id, "AAAAAAA"), create).unwrap();

    let request_id = ActionId::generate();
    let custom = action(event_id, ActionKind::Custom("FLAG".into()), "t2").with_request(request_id);
    ledger
        .append_if_legal(event_id, sealed.id, vec![custom])
        .unwrap();

    let stored = ledger.get_actions(event_id).unwrap();
    assert_eq!(stored[0], sealed);
    assert_eq!(stored[0].declaration, declaration);
    assert_eq!(stored[1].kind, ActionKind::Custom("FLAG".into()));
    assert_eq!(stored[1].request_id, Some(request_id));
}

#[test]
fn tracking_id_collision_is_reported() {
    let ledger = SqliteLedger::in_memory().unwrap();
    let first = EventId::generate();
    let second = EventId::generate();
    ledger
        .create_event(&header(first, "SAME"), action(first, ActionKind::Create, "t1"))
        .unwrap();

    let err = ledger
        .create_event(&header(second, "SAME"), action(second, ActionKind::Create, "t2"))
        .unwrap_err();

    assert!(matches!(err, LedgerError::TrackingIdCollision { .. }));
    assert!(ledger.get_actions(second).unwrap().is_empty());
}

#[test]
fn create_transaction_is_unique() {
    let ledger = SqliteLedger::in_memory().unwrap();
    let first = EventId::generate();
    let second = EventId::generate();
    ledger
        .create_event(&header(first, "A"), action(first, ActionKind::Create, "t1"))
        .unwrap();

    let err = ledger
        .create_event(&header(second, "B"), action(second, ActionKind::Create, "t1"))
        .unwrap_err();

    assert!(matches!(err, LedgerError::DuplicateTransaction { event_id: None, .. }));
    assert_eq!(
        ledger.find_event_by_create_transaction(&txn("t1")).unwrap(),
        Some(first)
    );
}

#[test]
fn create_requires_a_create_action() {
    let ledger = SqliteLedger::in_memory().unwrap();
    let event_id = EventId::generate();
    let err = ledger
        .create_event(&header(event_id, "A"), action(event_id, ActionKind::Declare, "t1"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::Projection(_)));
}

#[test]
fn history_cannot_be_rewritten() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.db");
    let ledger = SqliteLedger::open(&path).unwrap();
    let event_id = EventId::generate();
    ledger
        .create_event(&header(event_id, "A"), action(event_id, ActionKind::Create, "t1"))
        .unwrap();

    let raw = rusqlite::Connection::open(&path).unwrap();
    let update = raw.execute("UPDATE actions SET kind = 'REGISTER'", []);
    let delete = raw.execute("DELETE FROM events", []);

    assert!(update.is_err());
    assert!(delete.is_err());
    assert_eq!(ledger.get_actions(event_id).unwrap()[0].kind, ActionKind::Create);
}

#[test]
fn list_and_stats() {
    let ledger = SqliteLedger::in_memory().unwrap();
    for (i, tracking) in ["A", "B", "C"].iter().enumerate() {
        let event_id = EventId::generate();
        ledger
            .create_event(
                &header(event_id, tracking),
                action(event_id, ActionKind::Create, &format!("t{i}")),
            )
            .unwrap();
    }

    assert_eq!(ledger.list_events(0, 10).unwrap().len(), 3);
    assert_eq!(ledger.list_events(2, 10).unwrap().len(), 1);
    let stats = ledger.stats().unwrap();
    assert_eq!(stats.event_count, 3);
    assert_eq!(stats.action_count, 3);
    assert!(stats.db_size_bytes > 0);
}

// ============================================================================
// EventLedger
// ============================================================================

#[tokio::test]
async fn create_and_load() {
    let ledger = event_ledger().with_tracking_length(9);
    let document = created(&ledger, "t1").await;

    assert_eq!(document.tracking_id.as_str().len(), 9);
    assert_eq!(document.state.status, EventStatus::Draft);

    let loaded = ledger.load(document.id).await.unwrap();
    assert_eq!(loaded, document);
}

#[tokio::test]
async fn unknown_event_is_not_found() {
    let ledger = event_ledger();
    let err = ledger.load(EventId::generate()).await.unwrap_err();
    assert!(matches!(err, LedgerError::EventNotFound { .. }));
}

#[tokio::test]
async fn append_returns_document_after_the_append() {
    let ledger = event_ledger();
    let document = created(&ledger, "t1").await;

    let declared = ledger
        .append(&document, vec![action(document.id, ActionKind::Declare, "t2")])
        .await
        .unwrap();

    assert_eq!(declared.actions.len(), 2);
    assert_eq!(declared.state.status, EventStatus::Declared);
    assert_eq!(declared.actions[1].position, Some(2));
    assert_eq!(declared.actions[1].prev_hash, declared.actions[0].hash);
    assert_eq!(ledger.load(document.id).await.unwrap(), declared);
}

#[tokio::test]
async fn stale_base_conflicts() {
    let ledger = event_ledger();
    let document = created(&ledger, "t1").await;
    ledger
        .append(&document, vec![action(document.id, ActionKind::Read, "t2")])
        .await
        .unwrap();

    let err = ledger
        .append(&document, vec![action(document.id, ActionKind::Declare, "t3")])
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Conflict { .. }));
    assert_eq!(ledger.load(document.id).await.unwrap().actions.len(), 2);
}

#[tokio::test]
async fn duplicate_transaction_is_rejected() {
    let ledger = event_ledger();
    let document = created(&ledger, "t1").await;
    let document = ledger
        .append(&document, vec![action(document.id, ActionKind::Declare, "t2")])
        .await
        .unwrap();

    let err = ledger
        .append(&document, vec![action(document.id, ActionKind::Validate, "t2")])
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::DuplicateTransaction { event_id: Some(_), .. }));
    let found = ledger
        .find_action_by_transaction(document.id, &txn("t2"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.kind, ActionKind::Declare);
}

#[tokio::test]
async fn illegal_transition_appends_nothing() {
    let ledger = event_ledger();
    let document = created(&ledger, "t1").await;

    let err = ledger
        .append(&document, vec![action(document.id, ActionKind::Register, "t2")])
        .await
        .unwrap_err();

    match err {
        LedgerError::IllegalTransition { source, .. } => {
            assert_eq!(source.status, Some(EventStatus::Draft));
        },
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ledger.load(document.id).await.unwrap().actions.len(), 1);
}

#[tokio::test]
async fn batch_is_atomic() {
    let ledger = event_ledger();
    let document = created(&ledger, "t1").await;

    let err = ledger
        .append(
            &document,
            vec![
                action(document.id, ActionKind::Declare, "t2"),
                action(document.id, ActionKind::PrintCertificate, "t3"),
            ],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::IllegalTransition { .. }));
    assert_eq!(ledger.load(document.id).await.unwrap().actions.len(), 1);
}

#[tokio::test]
async fn verify_history_accepts_stored_chain() {
    let ledger = event_ledger();
    let document = created(&ledger, "t1").await;
    let document = ledger
        .append(
            &document,
            vec![
                action(document.id, ActionKind::Declare, "t2"),
                action(document.id, ActionKind::Validate, "t3"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(ledger.verify_history(document.id).await.unwrap(), 3);
}

#[tokio::test]
async fn float_payloads_survive_storage() {
    let ledger = event_ledger();
    let document = created(&ledger, "t1").await;
    let declaration: Payload = serde_json::from_value(json!({
        "child.weight": 2.663_987_731_472_464e-34,
        "child.height": 0.1 + 0.2,
        "child.ratio": 1.7976931348623157e308,
    }))
    .unwrap();

    let declared = ledger
        .append(
            &document,
            vec![action(document.id, ActionKind::Declare, "t2").with_declaration(declaration)],
        )
        .await
        .unwrap();

    assert_eq!(ledger.load(document.id).await.unwrap(), declared);
    assert_eq!(ledger.verify_history(document.id).await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_on_one_event_linearize() {
    let ledger = Arc::new(event_ledger());
    let document = Arc::new(created(&ledger, "t1").await);

    let mut handles = Vec::new();
    for i in 0..8 {
        let ledger = Arc::clone(&ledger);
        let document = Arc::clone(&document);
        handles.push(tokio::spawn(async move {
            ledger
                .append(
                    &document,
                    vec![action(document.id, ActionKind::Read, &format!("r{i}"))],
                )
                .await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(LedgerError::Conflict { .. }) => {},
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(ledger.load(document.id).await.unwrap().actions.len(), 2);
}

// ============================================================================
// Timeouts
// ============================================================================

/// Delegates to an in-memory ledger but never answers reads.
struct StalledBackend(SqliteLedger);

impl LedgerBackend for StalledBackend {
    fn create_event(
        &self,
        header: EventHeader,
        create: Action,
    ) -> BoxFuture<'_, Result<Action, LedgerError>> {
        LedgerBackend::create_event(&self.0, header, create)
    }

    fn append_if_legal(
        &self,
        event_id: EventId,
        expected_last: ActionId,
        actions: Vec<Action>,
    ) -> BoxFuture<'_, Result<Vec<Action>, LedgerError>> {
        LedgerBackend::append_if_legal(&self.0, event_id, expected_last, actions)
    }

    fn get_event(&self, _event_id: EventId) -> BoxFuture<'_, Result<EventHeader, LedgerError>> {
        Box::pin(std::future::pending())
    }

    fn get_actions(&self, event_id: EventId) -> BoxFuture<'_, Result<Vec<Action>, LedgerError>> {
        LedgerBackend::get_actions(&self.0, event_id)
    }

    fn find_action_by_transaction(
        &self,
        event_id: EventId,
        transaction_id: TransactionId,
    ) -> BoxFuture<'_, Result<Option<Action>, LedgerError>> {
        LedgerBackend::find_action_by_transaction(&self.0, event_id, transaction_id)
    }

    fn find_event_by_create_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> BoxFuture<'_, Result<Option<EventId>, LedgerError>> {
        LedgerBackend::find_event_by_create_transaction(&self.0, transaction_id)
    }

    fn list_events(
        &self,
        offset: u64,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<EventHeader>, LedgerError>> {
        LedgerBackend::list_events(&self.0, offset, limit)
    }

    fn stats(&self) -> BoxFuture<'_, Result<LedgerStats, LedgerError>> {
        LedgerBackend::stats(&self.0)
    }
}

#[tokio::test]
async fn stalled_storage_times_out() {
    let ledger = EventLedger::new(Arc::new(StalledBackend(SqliteLedger::in_memory().unwrap())))
        .with_storage_timeout(Duration::from_millis(20));

    let err = ledger.load(EventId::generate()).await.unwrap_err();

    assert!(matches!(err, LedgerError::Timeout { limit } if limit == Duration::from_millis(20)));
}
