//! Schema provider seam and the static, file-backed provider.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::error::SchemaError;
use super::field::ActionSchema;
use crate::BoxFuture;
use crate::action::ActionKind;

/// Supplies field definitions per event type and action kind.
///
/// Implementations may fetch from a remote configuration service; callers
/// bound every call with their own timeout.
pub trait SchemaProvider: Send + Sync {
    /// Returns the field definitions for `kind` on `event_type`.
    ///
    /// An action kind without configured fields yields an empty schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownEventType`] if the event type is not
    /// configured, or [`SchemaError::Unavailable`] if the source fails.
    fn field_definitions<'a>(
        &'a self,
        event_type: &'a str,
        kind: &'a ActionKind,
    ) -> BoxFuture<'a, Result<ActionSchema, SchemaError>>;
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    event_types: Vec<EventTypeEntry>,
}

#[derive(Debug, Deserialize)]
struct EventTypeEntry {
    id: String,
    #[serde(default)]
    actions: Vec<ActionEntry>,
}

#[derive(Debug, Deserialize)]
struct ActionEntry {
    kinds: Vec<ActionKind>,
    #[serde(flatten)]
    schema: ActionSchema,
}

/// In-memory schema provider, usually loaded from a TOML file.
///
/// ```toml
/// [[event_types]]
/// id = "birth"
///
/// [[event_types.actions]]
/// kinds = ["DECLARE", "VALIDATE", "REGISTER"]
///
/// [[event_types.actions.pages]]
/// id = "child"
///
/// [[event_types.actions.pages.fields]]
/// id = "child.dob"
/// type = "date"
/// required = true
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaProvider {
    event_types: HashMap<String, BTreeMap<ActionKind, ActionSchema>>,
}

impl StaticSchemaProvider {
    /// Creates a provider with no event types.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a provider from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or
    /// defines something twice.
    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        let provider = Self::from_toml(&content)?;
        debug!(
            path = %path.display(),
            event_types = provider.event_types.len(),
            "schemas loaded"
        );
        Ok(provider)
    }

    /// Parses a provider from TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML does not parse or defines something
    /// twice.
    pub fn from_toml(content: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile = toml::from_str(content)?;
        let mut provider = Self::new();
        for entry in file.event_types {
            if provider.event_types.contains_key(&entry.id) {
                return Err(SchemaError::DuplicateEventType {
                    event_type: entry.id,
                });
            }
            provider.event_types.insert(entry.id.clone(), BTreeMap::new());
            for action in entry.actions {
                for kind in action.kinds {
                    provider.insert(&entry.id, kind, action.schema.clone())?;
                }
            }
        }
        Ok(provider)
    }

    /// Registers an event type with no action schemas (builder pattern).
    #[must_use]
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types.entry(event_type.into()).or_default();
        self
    }

    /// Adds the schema for one action kind (builder pattern), registering
    /// the event type if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind already has a schema or the schema
    /// repeats a field id.
    pub fn with_schema(
        mut self,
        event_type: &str,
        kind: ActionKind,
        schema: ActionSchema,
    ) -> Result<Self, SchemaError> {
        self.event_types.entry(event_type.to_string()).or_default();
        self.insert(event_type, kind, schema)?;
        Ok(self)
    }

    fn insert(
        &mut self,
        event_type: &str,
        kind: ActionKind,
        schema: ActionSchema,
    ) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for (_, field) in schema.fields() {
            if !seen.insert(field.id.as_str()) {
                return Err(SchemaError::DuplicateField {
                    event_type: event_type.to_string(),
                    kind: kind.to_string(),
                    field: field.id.clone(),
                });
            }
        }

        let actions = self.event_types.entry(event_type.to_string()).or_default();
        if actions.contains_key(&kind) {
            return Err(SchemaError::DuplicateAction {
                event_type: event_type.to_string(),
                kind: kind.to_string(),
            });
        }
        actions.insert(kind, schema);
        Ok(())
    }

    /// Returns the configured event types, sorted.
    #[must_use]
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.event_types.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    fn lookup(&self, event_type: &str, kind: &ActionKind) -> Result<ActionSchema, SchemaError> {
        let actions =
            self.event_types
                .get(event_type)
                .ok_or_else(|| SchemaError::UnknownEventType {
                    event_type: event_type.to_string(),
                })?;
        Ok(actions.get(kind).cloned().unwrap_or_default())
    }
}

impl SchemaProvider for StaticSchemaProvider {
    fn field_definitions<'a>(
        &'a self,
        event_type: &'a str,
        kind: &'a ActionKind,
    ) -> BoxFuture<'a, Result<ActionSchema, SchemaError>> {
        Box::pin(async move { self.lookup(event_type, kind) })
    }
}
