//! Visibility conditions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::Payload;

/// Boolean expression evaluated against a flat key-value map.
///
/// In TOML a condition is written as a tagged table:
///
/// ```toml
/// visible_if = { and = [
///     { field = "informant.type" },
///     { not = { equals = { field = "informant.type", value = "MOTHER" } } },
/// ] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Always true.
    Always,
    /// True if the referenced field holds a truthy value.
    Field(String),
    /// True if the referenced field equals `value`.
    Equals {
        /// Referenced field id.
        field: String,
        /// Expected value.
        value: Value,
    },
    /// True if every operand is true. Empty is true.
    And(Vec<Condition>),
    /// True if any operand is true. Empty is false.
    Or(Vec<Condition>),
    /// Negation.
    Not(Box<Condition>),
}

impl Condition {
    /// Evaluates the condition against `data`.
    #[must_use]
    pub fn evaluate(&self, data: &Payload) -> bool {
        match self {
            Self::Always => true,
            Self::Field(id) => data.get(id).is_some_and(is_truthy),
            Self::Equals { field, value } => data.get(field).is_some_and(|v| values_equal(v, value)),
            Self::And(operands) => operands.iter().all(|c| c.evaluate(data)),
            Self::Or(operands) => operands.iter().any(|c| c.evaluate(data)),
            Self::Not(inner) => !inner.evaluate(data),
        }
    }

    /// Returns every field id the condition reads.
    #[must_use]
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Always => {},
            Self::Field(id) | Self::Equals { field: id, .. } => out.push(id),
            Self::And(operands) | Self::Or(operands) => {
                for operand in operands {
                    operand.collect_fields(out);
                }
            },
            Self::Not(inner) => inner.collect_fields(out),
        }
    }
}

/// Returns `false` for null, `false`, empty strings and empty collections.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

/// Numbers compare by value so `1` equals `1.0`.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64() == r.as_f64(),
        _ => left == right,
    }
}
