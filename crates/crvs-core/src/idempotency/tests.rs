use super::*;
use crate::action::{Action, ActorId};
use crate::ledger::SqliteLedger;

fn clerk() -> ActorId {
    ActorId::new("clerk-1").unwrap()
}

fn txn(raw: &str) -> TransactionId {
    TransactionId::new(raw).unwrap()
}

fn ledger() -> Arc<EventLedger> {
    Arc::new(EventLedger::new(Arc::new(SqliteLedger::in_memory().unwrap())))
}

async fn created(ledger: &EventLedger, raw_txn: &str) -> EventDocument {
    let create = Action::new(EventId::generate(), ActionKind::Create, clerk(), txn(raw_txn));
    ledger.create("birth", create).await.unwrap()
}

fn key(document: &EventDocument, raw_txn: &str) -> IdempotencyKey {
    IdempotencyKey::Action {
        event_id: document.id,
        transaction_id: txn(raw_txn),
    }
}

#[tokio::test]
async fn unknown_key_has_no_prior_result() {
    let ledger = ledger();
    let document = created(&ledger, "c1").await;
    let guard = IdempotencyGuard::new(ledger);

    let found = guard
        .lookup(&key(&document, "t-new"), &ActionKind::Declare)
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn replay_returns_the_document_as_it_stood() {
    let ledger = ledger();
    let document = created(&ledger, "c1").await;
    let guard = IdempotencyGuard::new(Arc::clone(&ledger));

    let declare = Action::new(document.id, ActionKind::Declare, clerk(), txn("t2"));
    let after_declare = ledger.append(&document, vec![declare]).await.unwrap();

    let validate = Action::new(document.id, ActionKind::Validate, clerk(), txn("t3"));
    ledger.append(&after_declare, vec![validate]).await.unwrap();

    let replay = guard
        .lookup(&key(&document, "t2"), &ActionKind::Declare)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(replay, after_declare);
    assert_eq!(replay.actions.len(), 2);
}

#[tokio::test]
async fn create_key_replays_the_created_event() {
    let ledger = ledger();
    let document = created(&ledger, "c1").await;
    let guard = IdempotencyGuard::new(ledger);

    let replay = guard
        .lookup(&IdempotencyKey::Create(txn("c1")), &ActionKind::Create)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(replay, document);
}

#[tokio::test]
async fn reuse_for_another_kind_is_refused() {
    let ledger = ledger();
    let document = created(&ledger, "c1").await;
    let declare = Action::new(document.id, ActionKind::Declare, clerk(), txn("t2"));
    ledger.append(&document, vec![declare]).await.unwrap();
    let guard = IdempotencyGuard::new(ledger);

    let err = guard
        .lookup(&key(&document, "t2"), &ActionKind::Validate)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IdempotencyError::TransactionReused {
            original: ActionKind::Declare,
            requested: ActionKind::Validate,
            ..
        }
    ));
}

#[tokio::test]
async fn dedupe_computes_once_then_replays() {
    let ledger = ledger();
    let document = created(&ledger, "c1").await;
    let guard = IdempotencyGuard::new(Arc::clone(&ledger));
    let key = key(&document, "t2");

    let first = guard
        .dedupe(&key, &ActionKind::Declare, || {
            let declare = Action::new(document.id, ActionKind::Declare, clerk(), txn("t2"));
            let ledger = Arc::clone(&ledger);
            let base = document.clone();
            async move {
                ledger
                    .append(&base, vec![declare])
                    .await
                    .map_err(IdempotencyError::from)
            }
        })
        .await
        .unwrap();
    assert!(!first.is_replay());

    let second = guard
        .dedupe::<_, _, IdempotencyError>(&key, &ActionKind::Declare, || async {
            panic!("must not recompute a committed request")
        })
        .await
        .unwrap();
    assert!(second.is_replay());
    assert_eq!(second.into_document(), first.into_document());
}

#[tokio::test]
async fn failure_after_a_concurrent_commit_is_replayed() {
    let ledger = ledger();
    let document = created(&ledger, "c1").await;
    let guard = IdempotencyGuard::new(Arc::clone(&ledger));
    let key = key(&document, "t2");

    // The identical request commits while this one is computing, so this
    // one's append hits the unique constraint.
    let outcome = guard
        .dedupe(&key, &ActionKind::Declare, || {
            let ledger = Arc::clone(&ledger);
            let base = document.clone();
            async move {
                let winner = Action::new(base.id, ActionKind::Declare, clerk(), txn("t2"));
                ledger.append(&base, vec![winner]).await.unwrap();
                let loser = Action::new(base.id, ActionKind::Declare, clerk(), txn("t2"));
                ledger
                    .append(&base, vec![loser])
                    .await
                    .map_err(IdempotencyError::from)
            }
        })
        .await
        .unwrap();

    assert!(outcome.is_replay());
    assert_eq!(outcome.into_document().actions.len(), 2);
}

#[tokio::test]
async fn genuine_failure_is_returned_unchanged() {
    let ledger = ledger();
    let document = created(&ledger, "c1").await;
    let guard = IdempotencyGuard::new(ledger);

    let err = guard
        .dedupe(&key(&document, "t2"), &ActionKind::Register, || async {
            Err::<EventDocument, _>(IdempotencyError::Ledger(LedgerError::EventNotFound {
                event_id: document.id,
            }))
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IdempotencyError::Ledger(LedgerError::EventNotFound { .. })
    ));
}

#[test]
fn keys_render_with_their_scope() {
    let event_id = EventId::generate();
    assert_eq!(IdempotencyKey::Create(txn("abc")).to_string(), "create/abc");
    let key = IdempotencyKey::Action {
        event_id,
        transaction_id: txn("abc"),
    };
    assert_eq!(key.to_string(), format!("{event_id}/abc"));
    assert_eq!(key.transaction_id().as_str(), "abc");
}
