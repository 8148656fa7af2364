//! `crvs create`, `crvs act` and `crvs state`.
//!
//! All three go through the router, so they are authorized, validated and
//! deduplicated exactly like any other client request. Re-running a command
//! with the same `--transaction-id` replays the original result.

use anyhow::{Context, Result};
use clap::Args;
use crvs_core::action::ActionId;
use crvs_core::{ActionKind, ActionRequest, ActionRouter, EventId, TransactionId};
use secrecy::SecretString;
use tracing::info;

use super::{parse_payload, print_json, print_summary};

/// Arguments for `crvs create`.
#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Configured event type
    #[arg(long)]
    pub event_type: String,

    /// Caller token
    #[arg(long, env = "CRVS_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Idempotency key; generated when omitted
    #[arg(long)]
    pub transaction_id: Option<String>,

    /// Initial declaration, as JSON or `@file`
    #[arg(long)]
    pub declaration: Option<String>,
}

/// Arguments for `crvs act`.
#[derive(Debug, Args)]
pub struct ActArgs {
    /// Action kind, e.g. `DECLARE` or `PRINT_CERTIFICATE`
    pub kind: ActionKind,

    /// Event id
    #[arg(long)]
    pub event: EventId,

    /// Caller token
    #[arg(long, env = "CRVS_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Idempotency key; generated when omitted
    #[arg(long)]
    pub transaction_id: Option<String>,

    /// Declaration fields, as JSON or `@file`
    #[arg(long)]
    pub declaration: Option<String>,

    /// Action-scoped fields, as JSON or `@file`
    #[arg(long)]
    pub annotation: Option<String>,

    /// Correction request reviewed by this action
    #[arg(long)]
    pub request_id: Option<ActionId>,
}

/// Arguments for `crvs state`.
#[derive(Debug, Args)]
pub struct StateArgs {
    /// Event id
    pub event: EventId,

    /// Caller token
    #[arg(long, env = "CRVS_TOKEN", hide_env_values = true)]
    pub token: String,
}

fn transaction_id(raw: Option<&str>) -> Result<TransactionId> {
    match raw {
        Some(raw) => TransactionId::new(raw).context("invalid transaction id"),
        None => {
            let generated = TransactionId::generate();
            info!(transaction_id = %generated, "generated transaction id");
            Ok(generated)
        },
    }
}

/// Creates an event.
pub async fn create(router: &ActionRouter, args: &CreateArgs, json: bool) -> Result<()> {
    let mut request = ActionRequest::create(
        &args.event_type,
        args.token.as_str(),
        transaction_id(args.transaction_id.as_deref())?,
    );
    if let Some(raw) = &args.declaration {
        request = request.with_declaration(parse_payload(raw).context("--declaration")?);
    }
    let transaction = request.transaction_id.clone();

    let document = router.handle(request).await?;
    if json {
        print_json(&document)
    } else {
        print_summary(&document);
        println!("transaction:  {transaction}");
        Ok(())
    }
}

/// Records one action.
pub async fn act(router: &ActionRouter, args: &ActArgs, json: bool) -> Result<()> {
    let mut request = ActionRequest::new(
        args.kind.clone(),
        args.event,
        args.token.as_str(),
        transaction_id(args.transaction_id.as_deref())?,
    );
    if let Some(raw) = &args.declaration {
        request = request.with_declaration(parse_payload(raw).context("--declaration")?);
    }
    if let Some(raw) = &args.annotation {
        request = request.with_annotation(parse_payload(raw).context("--annotation")?);
    }
    if let Some(request_id) = args.request_id {
        request = request.with_request(request_id);
    }
    let transaction = request.transaction_id.clone();

    let document = router.handle(request).await?;
    if json {
        print_json(&document)
    } else {
        print_summary(&document);
        println!("transaction:  {transaction}");
        Ok(())
    }
}

/// Prints the current state without recording anything.
pub async fn state(router: &ActionRouter, args: &StateArgs, json: bool) -> Result<()> {
    let token = SecretString::from(args.token.as_str());
    let state = router.get_current_state(args.event, &token).await?;
    if json {
        return print_json(&state);
    }
    println!("status:       {}", state.status);
    println!(
        "assigned to:  {}",
        state.assigned_to().map_or("-", |actor| actor.as_str())
    );
    if let Some(pending) = &state.pending_correction {
        println!("correction:   {} requested by {}", pending.request_id, pending.requested_by);
    }
    for (field, value) in &state.declaration {
        println!("  {field} = {value}");
    }
    Ok(())
}
