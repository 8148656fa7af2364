//! Lifecycle scenarios driven through the public router API.
//!
//! Every scenario wires the router against a real SQLite ledger and the
//! static collaborators, the way the CLI does.

use std::sync::Arc;

use crvs_core::action::ActionKind;
use crvs_core::identity::{Credential, StaticScopeChecker};
use crvs_core::ledger::{EventLedger, SqliteLedger};
use crvs_core::location::{LocationEntry, StaticLocationTree};
use crvs_core::projection::{EventDocument, EventStatus, fold};
use crvs_core::schema::StaticSchemaProvider;
use crvs_core::{ActionError, ActionRequest, ActionRouter, Payload, RouterConfig, TransactionId};
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

/// DECLARE accepts partial data; REGISTER insists on the complete record.
/// PRINT_CERTIFICATE asks for identity verification when someone other than
/// the mother collects the certificate.
const SCHEMAS: &str = r#"
[[event_types]]
id = "birth"

[[event_types.actions]]
kinds = ["DECLARE"]

[[event_types.actions.pages]]
id = "child"

[[event_types.actions.pages.fields]]
id = "child.name"
type = "name"

[[event_types.actions.pages.fields]]
id = "child.dob"
type = "date"

[[event_types.actions.pages.fields]]
id = "child.placeOfBirth"
type = "location"
within = "country"

[[event_types.actions]]
kinds = ["REGISTER"]

[[event_types.actions.pages]]
id = "child"

[[event_types.actions.pages.fields]]
id = "child.name"
type = "name"
required = true

[[event_types.actions.pages.fields]]
id = "child.dob"
type = "date"
required = true

[[event_types.actions.pages.fields]]
id = "child.placeOfBirth"
type = "location"
within = "country"
required = true

[[event_types.actions]]
kinds = ["PRINT_CERTIFICATE"]

[[event_types.actions.pages]]
id = "collector"

[[event_types.actions.pages.fields]]
id = "collector.type"
type = "select"
options = ["MOTHER", "OTHER"]
required = true

[[event_types.actions.pages]]
id = "verification"
visible_if = { equals = { field = "collector.type", value = "OTHER" } }

[[event_types.actions.pages.fields]]
id = "collector.idVerified"
type = "boolean"
required = true
"#;

const LOCATIONS: &str = r#"
[[locations]]
id = "country"

[[locations]]
id = "central"
parent = "country"

[[locations]]
id = "ibombo"
parent = "central"
"#;

const REGISTRAR: &str = "registrar-token";
const AGENT: &str = "agent-token";

fn credentials() -> Vec<Credential> {
    let everything = [
        "record.create",
        "record.declare",
        "record.validate",
        "record.register",
        "record.print-certificate",
        "record.assign",
        "record.read",
    ];
    vec![
        Credential {
            token: REGISTRAR.into(),
            actor_id: "registrar".into(),
            scopes: everything.iter().map(|s| (*s).to_string()).collect(),
        },
        Credential {
            token: AGENT.into(),
            actor_id: "agent".into(),
            scopes: everything.iter().map(|s| (*s).to_string()).collect(),
        },
    ]
}

fn router_over(ledger: SqliteLedger) -> ActionRouter {
    ActionRouter::new(
        Arc::new(EventLedger::new(Arc::new(ledger))),
        Arc::new(StaticSchemaProvider::from_toml(SCHEMAS).unwrap()),
        Arc::new(StaticScopeChecker::from_credentials(credentials()).unwrap()),
        Arc::new(StaticLocationTree::from_toml(LOCATIONS).unwrap()),
        RouterConfig::default(),
    )
}

fn router() -> ActionRouter {
    router_over(SqliteLedger::in_memory().unwrap())
}

fn txn(raw: &str) -> TransactionId {
    TransactionId::new(raw).unwrap()
}

fn payload(value: serde_json::Value) -> Payload {
    serde_json::from_value(value).unwrap()
}

fn complete_declaration() -> Payload {
    payload(json!({
        "child.name": {"firstname": "Chanda", "surname": "Mwale"},
        "child.dob": "2025-03-14",
        "child.placeOfBirth": "ibombo",
    }))
}

async fn act(
    router: &ActionRouter,
    kind: ActionKind,
    document: &EventDocument,
    token: &str,
    raw_txn: &str,
) -> Result<EventDocument, ActionError> {
    router
        .handle(ActionRequest::new(kind, document.id, token, txn(raw_txn)))
        .await
}

async fn create(router: &ActionRouter, raw_txn: &str) -> EventDocument {
    router
        .handle(ActionRequest::create("birth", REGISTRAR, txn(raw_txn)))
        .await
        .unwrap()
}

async fn declare(router: &ActionRouter, document: &EventDocument, declaration: Payload) -> EventDocument {
    router
        .handle(
            ActionRequest::new(ActionKind::Declare, document.id, REGISTRAR, txn("declare"))
                .with_declaration(declaration),
        )
        .await
        .unwrap()
}

fn lifecycle_kinds(document: &EventDocument) -> Vec<ActionKind> {
    document
        .actions
        .iter()
        .filter(|a| !a.kind.is_bookkeeping())
        .map(|a| a.kind.clone())
        .collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn create_declare_register_ends_registered_and_unassigned() {
    let dir = TempDir::new().unwrap();
    let router = router_over(SqliteLedger::open(dir.path().join("crvs.db")).unwrap());

    let document = create(&router, "create").await;
    let document = declare(&router, &document, complete_declaration()).await;
    let registered = act(&router, ActionKind::Register, &document, REGISTRAR, "register")
        .await
        .unwrap();

    assert_eq!(
        lifecycle_kinds(&registered),
        vec![ActionKind::Create, ActionKind::Declare, ActionKind::Register]
    );
    assert_eq!(registered.last_action().unwrap().kind, ActionKind::Unassign);
    assert_eq!(registered.state.status, EventStatus::Registered);
    assert!(registered.state.assignment.is_none());
    assert!(registered.state.registration_number.is_some());

    let stored = router.ledger().load(registered.id).await.unwrap();
    assert_eq!(stored, registered);
    router.ledger().verify_history(registered.id).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_registers_append_once() {
    let router = Arc::new(router());
    let document = create(&router, "create").await;
    let document = declare(&router, &document, complete_declaration()).await;

    let register = ActionRequest::new(ActionKind::Register, document.id, REGISTRAR, txn("register"));
    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let router = Arc::clone(&router);
            let request = register.clone();
            tokio::spawn(async move { router.handle(request).await })
        })
        .collect();

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap().unwrap());
    }
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));

    let stored = router.ledger().load(document.id).await.unwrap();
    let registers = stored
        .actions
        .iter()
        .filter(|a| a.kind == ActionKind::Register)
        .count();
    assert_eq!(registers, 1);
    assert_eq!(stored.actions.len(), document.actions.len() + 2);
}

#[tokio::test]
async fn identical_retry_appends_exactly_once() {
    let router = router();
    let document = create(&router, "create").await;
    let request = ActionRequest::new(ActionKind::Declare, document.id, REGISTRAR, txn("d"))
        .with_declaration(complete_declaration());

    let first = router.handle(request.clone()).await.unwrap();
    let second = router.handle(request).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(router.ledger().load(document.id).await.unwrap().actions.len(), 2);
}

#[tokio::test]
async fn other_actor_cannot_mutate_an_assigned_event() {
    let router = router();
    let document = create(&router, "create").await;

    for (kind, raw_txn) in [
        (ActionKind::Declare, "b1"),
        (ActionKind::Register, "b2"),
        (ActionKind::Archive, "b3"),
    ] {
        let err = act(&router, kind, &document, AGENT, raw_txn).await.unwrap_err();
        assert!(
            matches!(err, ActionError::Conflict { .. } | ActionError::Forbidden { .. }),
            "unexpected {err:?}"
        );
    }
    assert_eq!(router.ledger().load(document.id).await.unwrap().actions.len(), 1);
}

#[tokio::test]
async fn register_lists_every_missing_field() {
    let router = router();
    let document = create(&router, "create").await;
    let document = declare(&router, &document, payload(json!({"child.dob": "2025-03-14"}))).await;

    let err = act(&router, ActionKind::Register, &document, REGISTRAR, "register")
        .await
        .unwrap_err();
    let ActionError::Validation(errors) = err else {
        panic!("expected validation error, got {err:?}");
    };
    let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["child.name", "child.placeOfBirth"]);
    assert_eq!(router.ledger().load(document.id).await.unwrap().state.status, EventStatus::Declared);
}

#[tokio::test]
async fn print_certificate_requires_visible_verification_fields() {
    let router = router();
    let document = create(&router, "create").await;
    let document = declare(&router, &document, complete_declaration()).await;
    let document = act(&router, ActionKind::Register, &document, REGISTRAR, "register")
        .await
        .unwrap();
    let document = act(&router, ActionKind::Assign, &document, REGISTRAR, "assign")
        .await
        .unwrap();

    let print = |collector: serde_json::Value, raw_txn: &str| {
        ActionRequest::new(ActionKind::PrintCertificate, document.id, REGISTRAR, txn(raw_txn))
            .with_annotation(payload(collector))
    };

    let err = router
        .handle(print(json!({"collector.type": "OTHER"}), "p1"))
        .await
        .unwrap_err();
    let ActionError::Validation(errors) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "collector.idVerified");

    let printed = router
        .handle(print(json!({"collector.type": "MOTHER", "collector.idVerified": true}), "p2"))
        .await
        .unwrap();
    assert_eq!(printed.state.certificates_printed, 1);
    assert!(printed.state.assignment.is_none());
    // Hidden fields are stripped before storage.
    let stored = printed
        .actions
        .iter()
        .find(|a| a.kind == ActionKind::PrintCertificate)
        .unwrap();
    assert!(!stored.annotation.contains_key("collector.idVerified"));
}

#[tokio::test]
async fn location_outside_jurisdiction_is_rejected() {
    let router = router();
    let document = create(&router, "create").await;

    let err = router
        .handle(
            ActionRequest::new(ActionKind::Declare, document.id, REGISTRAR, txn("d"))
                .with_declaration(payload(json!({"child.placeOfBirth": "atlantis"}))),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");
}

#[tokio::test]
async fn stored_history_folds_to_the_returned_state() {
    let router = router();
    let document = create(&router, "create").await;
    let document = declare(&router, &document, complete_declaration()).await;
    let document = act(&router, ActionKind::Validate, &document, REGISTRAR, "validate")
        .await
        .unwrap();

    let header = document.header();
    let first = fold(&header, &document.actions).unwrap();
    let second = fold(&header, &document.actions).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, document.state);
}
