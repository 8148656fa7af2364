//! CLI command implementations.

pub mod action;
pub mod inspect;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat};
use crvs_core::{EventDocument, Payload};
use serde::Serialize;

/// Parses a JSON object given inline or as `@path`.
pub fn parse_payload(raw: &str) -> Result<Payload> {
    let text = match raw.strip_prefix('@') {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?
        },
        None => raw.to_string(),
    };
    serde_json::from_str(&text).context("payload must be a JSON object")
}

/// Renders nanoseconds since the epoch as RFC 3339.
pub fn render_ns(ns: u64) -> String {
    DateTime::from_timestamp_nanos(i64::try_from(ns).unwrap_or(i64::MAX))
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Prints `value` as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{rendered}");
    Ok(())
}

/// Prints a one-screen summary of `document`.
pub fn print_summary(document: &EventDocument) {
    let state = &document.state;
    println!("event:        {}", document.id);
    println!("type:         {}", document.event_type);
    println!("tracking id:  {}", document.tracking_id);
    println!("status:       {}", state.status);
    println!(
        "assigned to:  {}",
        state.assigned_to().map_or("-", |actor| actor.as_str())
    );
    if let Some(number) = &state.registration_number {
        println!("registration: {number}");
    }
    println!("updated:      {} by {}", render_ns(state.updated_at_ns), state.updated_by);
    println!("actions:      {}", document.actions.len());
}
