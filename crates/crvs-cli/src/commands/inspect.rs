//! `crvs show`, `crvs verify` and `crvs list`.
//!
//! These read the ledger directly, bypassing authorization. They are
//! operator tools for the machine that holds the database.

use anyhow::{Context, Result};
use crvs_core::EventId;
use crvs_core::ledger::EventLedger;
use serde::Serialize;

use super::{print_json, render_ns};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyReport {
    event_id: EventId,
    verified_actions: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListEntry {
    id: EventId,
    event_type: String,
    tracking_id: String,
    status: String,
    created_at: String,
    actions: u64,
}

/// Prints the full document as JSON.
pub async fn show(ledger: &EventLedger, event_id: EventId) -> Result<()> {
    let document = ledger
        .load(event_id)
        .await
        .with_context(|| format!("failed to load event {event_id}"))?;
    print_json(&document)
}

/// Re-derives and checks the event's hash chain.
pub async fn verify(ledger: &EventLedger, event_id: EventId, json: bool) -> Result<()> {
    let verified_actions = ledger
        .verify_history(event_id)
        .await
        .with_context(|| format!("history of event {event_id} failed verification"))?;
    if json {
        print_json(&VerifyReport {
            event_id,
            verified_actions,
        })
    } else {
        println!("event {event_id}: {verified_actions} actions verified");
        Ok(())
    }
}

/// Lists events, oldest first.
pub async fn list(ledger: &EventLedger, offset: u64, limit: u64, json: bool) -> Result<()> {
    let headers = ledger
        .list_events(offset, limit)
        .await
        .context("failed to list events")?;

    let mut entries = Vec::with_capacity(headers.len());
    for header in headers {
        let state = ledger
            .state(header.id)
            .await
            .with_context(|| format!("failed to project event {}", header.id))?;
        entries.push(ListEntry {
            id: header.id,
            event_type: header.event_type,
            tracking_id: header.tracking_id.to_string(),
            status: state.status.to_string(),
            created_at: render_ns(header.created_at_ns),
            actions: state.action_count,
        });
    }

    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("no events");
        return Ok(());
    }
    println!(
        "{:<36}  {:<10}  {:<10}  {:<20}  {:<20}  ACTIONS",
        "ID", "TYPE", "TRACKING", "STATUS", "CREATED"
    );
    for entry in &entries {
        println!(
            "{:<36}  {:<10}  {:<10}  {:<20}  {:<20}  {}",
            entry.id,
            entry.event_type,
            entry.tracking_id,
            entry.status,
            entry.created_at,
            entry.actions
        );
    }
    Ok(())
}
