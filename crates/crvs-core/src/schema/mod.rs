//! Field definitions, visibility conditions and the schema provider seam.
//!
//! Each configured event type carries, per action kind, an ordered list of
//! pages. A page holds fields; both may carry a [`Condition`] that hides
//! them depending on the data already entered. Hidden fields are never
//! required and never stored.
//!
//! # Example
//!
//! ```rust
//! use crvs_core::action::{ActionKind, Payload};
//! use crvs_core::schema::{SchemaProvider, StaticSchemaProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = StaticSchemaProvider::from_toml(
//!     r#"
//!     [[event_types]]
//!     id = "birth"
//!
//!     [[event_types.actions]]
//!     kinds = ["DECLARE"]
//!
//!     [[event_types.actions.pages]]
//!     id = "child"
//!
//!     [[event_types.actions.pages.fields]]
//!     id = "child.dob"
//!     type = "date"
//!     required = true
//!     "#,
//! )?;
//!
//! let schema = provider
//!     .field_definitions("birth", &ActionKind::Declare)
//!     .await?;
//! assert!(schema.hidden_fields(&Payload::new()).is_empty());
//! # Ok(())
//! # }
//! ```

mod condition;
mod error;
mod field;
mod provider;

#[cfg(test)]
mod tests;

pub use condition::{Condition, is_truthy};
pub use error::SchemaError;
pub use field::{
    ActionSchema, FieldDefinition, FieldProblem, FieldType, PageDefinition, is_present,
};
pub use provider::{SchemaProvider, StaticSchemaProvider};
