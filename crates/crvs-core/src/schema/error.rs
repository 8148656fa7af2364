//! Schema errors.

use thiserror::Error;

/// Errors from loading or querying field definitions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchemaError {
    /// No schemas are configured for the event type.
    #[error("unknown event type: {event_type}")]
    UnknownEventType {
        /// The requested event type.
        event_type: String,
    },

    /// The schema file could not be read.
    #[error("failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    /// The schema file is not valid TOML or does not match the format.
    #[error("failed to parse schema file: {0}")]
    Parse(#[from] toml::de::Error),

    /// An event type is defined twice.
    #[error("event type {event_type} is defined twice")]
    DuplicateEventType {
        /// The repeated event type.
        event_type: String,
    },

    /// An action kind has two schemas within one event type.
    #[error("action {kind} of event type {event_type} is defined twice")]
    DuplicateAction {
        /// The event type.
        event_type: String,
        /// The repeated action kind.
        kind: String,
    },

    /// A field id appears twice within one action schema.
    #[error("field {field} is defined twice for {kind} of event type {event_type}")]
    DuplicateField {
        /// The event type.
        event_type: String,
        /// The action kind.
        kind: String,
        /// The repeated field id.
        field: String,
    },

    /// The schema source could not be consulted.
    #[error("schema source unavailable: {0}")]
    Unavailable(String),
}
