use serde_json::json;

use super::*;
use crate::action::{ActionKind, Payload};

const BIRTH: &str = r#"
[[event_types]]
id = "birth"

[[event_types.actions]]
kinds = ["DECLARE", "VALIDATE", "REGISTER"]

[[event_types.actions.pages]]
id = "child"

[[event_types.actions.pages.fields]]
id = "child.dob"
type = "date"
required = true

[[event_types.actions.pages.fields]]
id = "child.placeOfBirth"
type = "location"
within = "country"

[[event_types.actions.pages]]
id = "informant"

[[event_types.actions.pages.fields]]
id = "informant.type"
type = "select"
options = ["MOTHER", "OTHER"]
required = true

[[event_types.actions.pages.fields]]
id = "informant.email"
type = "email"
required = true
visible_if = { not = { equals = { field = "informant.type", value = "MOTHER" } } }

[[event_types.actions]]
kinds = ["NOTIFY"]

[[event_types.actions.pages]]
id = "child"

[[event_types.actions.pages.fields]]
id = "child.dob"
type = "date"

[[event_types]]
id = "death"
"#;

// =============================================================================
// StaticSchemaProvider
// =============================================================================

#[tokio::test]
async fn shared_action_block_serves_every_listed_kind() {
    let provider = StaticSchemaProvider::from_toml(BIRTH).unwrap();

    for kind in [ActionKind::Declare, ActionKind::Validate, ActionKind::Register] {
        let schema = provider.field_definitions("birth", &kind).await.unwrap();
        let ids: Vec<&str> = schema.fields().map(|(_, f)| f.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "child.dob",
                "child.placeOfBirth",
                "informant.type",
                "informant.email"
            ]
        );
    }

    let notify = provider
        .field_definitions("birth", &ActionKind::Notify)
        .await
        .unwrap();
    let dob = notify.fields().next().unwrap().1;
    assert!(!dob.required);
}

#[tokio::test]
async fn unconfigured_kind_has_empty_schema() {
    let provider = StaticSchemaProvider::from_toml(BIRTH).unwrap();

    let schema = provider
        .field_definitions("death", &ActionKind::Declare)
        .await
        .unwrap();
    assert!(schema.is_empty());

    let custom = provider
        .field_definitions("birth", &ActionKind::Custom("FLAG".into()))
        .await
        .unwrap();
    assert!(custom.is_empty());
}

#[tokio::test]
async fn unknown_event_type_is_an_error() {
    let provider = StaticSchemaProvider::from_toml(BIRTH).unwrap();
    let err = provider
        .field_definitions("adoption", &ActionKind::Declare)
        .await
        .unwrap_err();
    assert!(matches!(err, SchemaError::UnknownEventType { event_type } if event_type == "adoption"));
}

#[test]
fn event_types_are_listed_sorted() {
    let provider = StaticSchemaProvider::from_toml(BIRTH).unwrap();
    assert_eq!(provider.event_types(), vec!["birth", "death"]);
}

#[test]
fn duplicates_are_rejected() {
    let twice = "[[event_types]]\nid = \"birth\"\n[[event_types]]\nid = \"birth\"\n";
    assert!(matches!(
        StaticSchemaProvider::from_toml(twice),
        Err(SchemaError::DuplicateEventType { .. })
    ));

    let kind_twice = r#"
        [[event_types]]
        id = "birth"
        [[event_types.actions]]
        kinds = ["DECLARE"]
        [[event_types.actions]]
        kinds = ["VALIDATE", "DECLARE"]
    "#;
    assert!(matches!(
        StaticSchemaProvider::from_toml(kind_twice),
        Err(SchemaError::DuplicateAction { kind, .. }) if kind == "DECLARE"
    ));

    let field_twice = r#"
        [[event_types]]
        id = "birth"
        [[event_types.actions]]
        kinds = ["DECLARE"]
        [[event_types.actions.pages]]
        id = "a"
        [[event_types.actions.pages.fields]]
        id = "x"
        type = "boolean"
        [[event_types.actions.pages]]
        id = "b"
        [[event_types.actions.pages.fields]]
        id = "x"
        type = "boolean"
    "#;
    assert!(matches!(
        StaticSchemaProvider::from_toml(field_twice),
        Err(SchemaError::DuplicateField { field, .. }) if field == "x"
    ));
}

#[test]
fn invalid_kind_names_fail_to_parse() {
    let bad = r#"
        [[event_types]]
        id = "birth"
        [[event_types.actions]]
        kinds = ["declare"]
    "#;
    assert!(matches!(
        StaticSchemaProvider::from_toml(bad),
        Err(SchemaError::Parse(_))
    ));
}

#[test]
fn from_file_reads_toml() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("schemas.toml");
    std::fs::write(&path, BIRTH).unwrap();

    let provider = StaticSchemaProvider::from_file(&path).unwrap();
    assert_eq!(provider.event_types().len(), 2);

    let missing = StaticSchemaProvider::from_file(&dir.path().join("nope.toml"));
    assert!(matches!(missing, Err(SchemaError::Io(_))));
}

#[tokio::test]
async fn builder_registers_schemas() {
    let schema = ActionSchema {
        pages: vec![PageDefinition {
            id: "p".into(),
            visible_if: None,
            fields: vec![FieldDefinition {
                id: "flag".into(),
                field_type: FieldType::Boolean,
                required: true,
                visible_if: None,
            }],
        }],
    };
    let provider = StaticSchemaProvider::new()
        .with_event_type("death")
        .with_schema("birth", ActionKind::Declare, schema.clone())
        .unwrap();

    assert_eq!(
        provider
            .field_definitions("birth", &ActionKind::Declare)
            .await
            .unwrap(),
        schema
    );
    assert!(
        provider
            .with_schema("birth", ActionKind::Declare, schema)
            .is_err()
    );
}

// =============================================================================
// Visibility
// =============================================================================

#[tokio::test]
async fn conditional_field_hidden_for_mother_informant() {
    let provider = StaticSchemaProvider::from_toml(BIRTH).unwrap();
    let schema = provider
        .field_definitions("birth", &ActionKind::Declare)
        .await
        .unwrap();

    let mut data = Payload::new();
    data.insert("informant.type".into(), json!("MOTHER"));
    assert_eq!(schema.hidden_fields(&data), vec!["informant.email"]);

    data.insert("informant.type".into(), json!("OTHER"));
    assert!(schema.hidden_fields(&data).is_empty());
}

#[test]
fn field_problems_serialize_with_codes() {
    let value = serde_json::to_value(FieldProblem::Required).unwrap();
    assert_eq!(value, json!({"code": "REQUIRED"}));

    let value = serde_json::to_value(FieldProblem::OutsideJurisdiction {
        within: "district-1".into(),
    })
    .unwrap();
    assert_eq!(
        value,
        json!({"code": "OUTSIDE_JURISDICTION", "within": "district-1"})
    );
}
