//! Field, page and action schema definitions.

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::condition::Condition;
use crate::action::Payload;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("invalid email pattern")
});

/// Closed set of field types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    /// Free text.
    Text {
        /// Maximum length in characters.
        #[serde(default)]
        max_length: Option<usize>,
    },
    /// A number, optionally bounded.
    Number {
        /// Inclusive lower bound.
        #[serde(default)]
        min: Option<f64>,
        /// Inclusive upper bound.
        #[serde(default)]
        max: Option<f64>,
    },
    /// `true` or `false`.
    Boolean,
    /// ISO calendar date, `YYYY-MM-DD`.
    Date,
    /// One of a fixed set of strings.
    Select {
        /// Allowed values.
        options: Vec<String>,
    },
    /// An email address.
    Email,
    /// A person's name: `{ "firstname": .., "surname": .. }`.
    Name,
    /// A location id from the location hierarchy.
    Location {
        /// Jurisdiction the location must fall under.
        #[serde(default)]
        within: Option<String>,
    },
}

/// What is wrong with one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum FieldProblem {
    /// Required and visible, but absent.
    Required,
    /// Present with the wrong JSON type.
    WrongType {
        /// Expected type.
        expected: String,
    },
    /// Text longer than allowed.
    TooLong {
        /// Maximum length.
        max: usize,
    },
    /// Number outside its bounds.
    OutOfRange {
        /// Lower bound.
        min: Option<f64>,
        /// Upper bound.
        max: Option<f64>,
    },
    /// Not a valid `YYYY-MM-DD` date.
    InvalidDate,
    /// Not one of the allowed options.
    NotAnOption {
        /// Allowed values.
        options: Vec<String>,
    },
    /// Not an email address.
    InvalidEmail,
    /// Name without a first name or surname.
    IncompleteName,
    /// The location does not exist.
    UnknownLocation,
    /// The location exists but lies outside the jurisdiction.
    OutsideJurisdiction {
        /// The required jurisdiction.
        within: String,
    },
    /// The event type is not configured.
    UnknownEventType,
    /// The value is not allowed here.
    NotAllowed {
        /// Why.
        reason: String,
    },
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("required"),
            Self::WrongType { expected } => write!(f, "expected {expected}"),
            Self::TooLong { max } => write!(f, "longer than {max} characters"),
            Self::OutOfRange { min, max } => write!(f, "out of range [{min:?}, {max:?}]"),
            Self::InvalidDate => f.write_str("not a YYYY-MM-DD date"),
            Self::NotAnOption { options } => write!(f, "not one of {}", options.join(", ")),
            Self::InvalidEmail => f.write_str("not an email address"),
            Self::IncompleteName => f.write_str("firstname and surname are required"),
            Self::UnknownLocation => f.write_str("unknown location"),
            Self::OutsideJurisdiction { within } => write!(f, "not within {within}"),
            Self::UnknownEventType => f.write_str("unknown event type"),
            Self::NotAllowed { reason } => f.write_str(reason),
        }
    }
}

impl FieldType {
    /// Checks the shape of a present value.
    ///
    /// Location existence and containment need the location resolver and
    /// are checked by the validator.
    ///
    /// # Errors
    ///
    /// Returns the first problem with the value.
    pub fn check_shape(&self, value: &Value) -> Result<(), FieldProblem> {
        match self {
            Self::Text { max_length } => {
                let text = expect_str(value, "text")?;
                match max_length {
                    Some(max) if text.chars().count() > *max => {
                        Err(FieldProblem::TooLong { max: *max })
                    },
                    _ => Ok(()),
                }
            },
            Self::Number { min, max } => {
                let number = value.as_f64().ok_or_else(|| wrong_type("number"))?;
                let below = min.is_some_and(|min| number < min);
                let above = max.is_some_and(|max| number > max);
                if below || above {
                    Err(FieldProblem::OutOfRange {
                        min: *min,
                        max: *max,
                    })
                } else {
                    Ok(())
                }
            },
            Self::Boolean => value
                .as_bool()
                .map(|_| ())
                .ok_or_else(|| wrong_type("boolean")),
            Self::Date => {
                let raw = expect_str(value, "date")?;
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map(|_| ())
                    .map_err(|_| FieldProblem::InvalidDate)
            },
            Self::Select { options } => {
                let raw = expect_str(value, "option")?;
                if options.iter().any(|o| o == raw) {
                    Ok(())
                } else {
                    Err(FieldProblem::NotAnOption {
                        options: options.clone(),
                    })
                }
            },
            Self::Email => {
                let raw = expect_str(value, "email")?;
                if EMAIL.is_match(raw) {
                    Ok(())
                } else {
                    Err(FieldProblem::InvalidEmail)
                }
            },
            Self::Name => {
                let name = value.as_object().ok_or_else(|| wrong_type("name"))?;
                let part = |key: &str| {
                    name.get(key)
                        .and_then(Value::as_str)
                        .is_some_and(|s| !s.trim().is_empty())
                };
                if part("firstname") && part("surname") {
                    Ok(())
                } else {
                    Err(FieldProblem::IncompleteName)
                }
            },
            Self::Location { .. } => expect_str(value, "location id").map(|_| ()),
        }
    }
}

fn wrong_type(expected: &str) -> FieldProblem {
    FieldProblem::WrongType {
        expected: expected.to_string(),
    }
}

fn expect_str<'a>(value: &'a Value, expected: &str) -> Result<&'a str, FieldProblem> {
    value.as_str().ok_or_else(|| wrong_type(expected))
}

/// Returns `true` if `value` counts as supplied for a required field.
///
/// `false` and `0` are supplied values; null, empty strings and empty
/// collections are not.
#[must_use]
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// One field of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field id, also the payload key.
    pub id: String,

    /// Type and format constraints.
    #[serde(flatten)]
    pub field_type: FieldType,

    /// Whether a visible field must be supplied.
    #[serde(default)]
    pub required: bool,

    /// Visibility condition; visible when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_if: Option<Condition>,
}

/// A page of fields with its own visibility condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDefinition {
    /// Page id.
    pub id: String,

    /// Visibility condition; visible when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_if: Option<Condition>,

    /// Fields in display order.
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl PageDefinition {
    /// Returns `true` if the page is visible for `data`.
    #[must_use]
    pub fn is_visible(&self, data: &Payload) -> bool {
        self.visible_if.as_ref().is_none_or(|c| c.evaluate(data))
    }
}

/// Field definitions for one `(event type, action kind)` pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionSchema {
    /// Pages in display order.
    #[serde(default)]
    pub pages: Vec<PageDefinition>,
}

impl ActionSchema {
    /// Returns every field with its page, in order.
    pub fn fields(&self) -> impl Iterator<Item = (&PageDefinition, &FieldDefinition)> {
        self.pages
            .iter()
            .flat_map(|page| page.fields.iter().map(move |field| (page, field)))
    }

    /// Returns `true` if `field` on `page` is visible for `data`.
    #[must_use]
    pub fn is_visible(page: &PageDefinition, field: &FieldDefinition, data: &Payload) -> bool {
        page.is_visible(data) && field.visible_if.as_ref().is_none_or(|c| c.evaluate(data))
    }

    /// Returns the ids of fields hidden for `data`.
    #[must_use]
    pub fn hidden_fields(&self, data: &Payload) -> Vec<&str> {
        self.fields()
            .filter(|(page, field)| !Self::is_visible(page, field, data))
            .map(|(_, field)| field.id.as_str())
            .collect()
    }

    /// Returns `true` if the schema defines no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.fields.is_empty())
    }
}
